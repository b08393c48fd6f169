//! Ollama backend implementation
//!
//! HTTP client for the Ollama API (`/api/generate`, non-streaming). Prompts
//! come from the prompt library so they can be overridden on disk.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Preview;
use crate::prompts::{PromptId, PromptLibrary, PREVIEW_VAR};

use super::parsing::{parse_column_detection, parse_sales_classification};
use super::types::{ColumnDetection, SalesClassification};
use super::{AIBackend, DEFAULT_TIMEOUT};

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: DEFAULT_TIMEOUT,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Create a new instance with a different request timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Use a specific prompt library (e.g. embedded-only in tests)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }

    fn render(&self, id: PromptId, preview: &Preview) -> Result<(Option<String>, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(id)?;
        let preview_json = preview.to_split_json().to_string();
        let vars = HashMap::from([(PREVIEW_VAR, preview_json.as_str())]);
        Ok((
            template.system_section().map(str::to_string),
            template.render_user(&vars),
        ))
    }

    async fn generate(&self, system: Option<String>, prompt: String) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            system,
            format: Some("json"),
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(model = %self.model, "Ollama response: {}", ollama_response.response);
        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn detect_columns(&self, preview: &Preview) -> Result<ColumnDetection> {
        let (system, prompt) = self.render(PromptId::DetectColumns, preview)?;
        let response = self.generate(system, prompt).await?;
        parse_column_detection(&response)
    }

    async fn classify_sales(&self, preview: &Preview) -> Result<SalesClassification> {
        let (system, prompt) = self.render(PromptId::ClassifySales, preview)?;
        let response = self.generate(system, prompt).await?;
        parse_sales_classification(&response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
