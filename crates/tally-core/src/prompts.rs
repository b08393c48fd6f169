//! Prompt Library for model-assisted detection
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Prompt files carry YAML frontmatter (`id`, `version`, `task_type`) followed by
//! `# System` and `# User` sections. `{{name}}` placeholders are substituted at
//! render time.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const DETECT_COLUMNS: &str = include_str!("../../../prompts/detect_columns.md");
    pub const CLASSIFY_SALES: &str = include_str!("../../../prompts/classify_sales.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Locate the header row plus sales and bill columns in a preview
    DetectColumns,
    /// Decide whether a preview looks like a sales export
    ClassifySales,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectColumns => "detect_columns",
            Self::ClassifySales => "classify_sales",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::DetectColumns, Self::ClassifySales]
    }

    /// Look up a prompt by its string identifier
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == s)
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::DetectColumns => defaults::DETECT_COLUMNS,
            Self::ClassifySales => defaults::CLASSIFY_SALES,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt body (system + user sections)
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Whether the rendered user text will contain `{{name}}`'s value
    pub fn uses_var(&self, name: &str) -> bool {
        let template = self.user_section().unwrap_or(&self.content);
        template.contains(&format!("{{{{{}}}}}", name))
    }

    /// Render the user section (or the whole body if it has none)
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        let template = self.user_section().unwrap_or(&self.content);
        substitute(template, vars)
    }
}

/// Template variable carrying the split-orientation preview
pub const PREVIEW_VAR: &str = "preview";

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(path) = self.override_path(id).filter(|p| p.exists()) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            let prompt = Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(path),
            };
            if !prompt.uses_var(PREVIEW_VAR) {
                warn!(
                    prompt = id.as_str(),
                    "Prompt override has no {{{{preview}}}} placeholder; the model won't see the data"
                );
            }
            return Ok(prompt);
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let override_path = self.override_path(id).filter(|p| p.exists());
                let prompt = self.get(id).ok();
                PromptInfo {
                    renders_preview: prompt.is_some_and(|p| p.uses_var(PREVIEW_VAR)),
                    id: id.as_str().to_string(),
                    version: prompt.map(|p| p.metadata.version).unwrap_or(0),
                    task_type: prompt
                        .map(|p| p.metadata.task_type.clone())
                        .unwrap_or_default(),
                    has_override: override_path.is_some(),
                    override_path,
                }
            })
            .collect()
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_path(id).is_some_and(|p| p.exists())
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub task_type: String,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
    /// False when an override dropped the `{{preview}}` placeholder
    pub renders_preview: bool,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("prompts").join("overrides"))
}

/// Split a prompt file into frontmatter metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();
    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, rest[end + 3..].trim().to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after = &content[start + header.len()..];
    let end = after.find("\n# ").unwrap_or(after.len());
    Some(after[..end].trim())
}

fn substitute(template: &str, vars: &HashMap<&str, &str>) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{}}}}}", key), value)
    })
}
