//! Prompts-related command implementations

use anyhow::Result;
use tally_core::prompts::{default_prompts_dir, PromptId, PromptLibrary, PREVIEW_VAR};

/// List both prompts with their source and whether they still embed the preview
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!(
        "{:<16} {:>7}  {:<24}  {:<10}  {}",
        "ID", "VERSION", "TASK TYPE", "SOURCE", "PREVIEW"
    );
    println!("{}", "-".repeat(72));

    let mut broken = 0;
    for info in library.list() {
        if !info.renders_preview {
            broken += 1;
        }
        println!(
            "{:<16} {:>7}  {:<24}  {:<10}  {}",
            info.id,
            info.version,
            info.task_type,
            if info.has_override { "✓ Custom" } else { "Default" },
            if info.renders_preview { "yes" } else { "⚠️  missing" }
        );
    }

    if broken > 0 {
        println!();
        println!(
            "⚠️  {} override(s) lack the {{{{{}}}}} placeholder; the model won't see the file.",
            broken, PREVIEW_VAR
        );
    }

    println!();
    match default_prompts_dir() {
        Some(dir) => {
            println!("Overrides: {}", dir.display());
            println!("Copy a default there as <id>.md and edit it; `tally prompts show <id>` prints the default.");
        }
        None => println!("Overrides: (no data directory on this system)"),
    }

    Ok(())
}

/// Print one prompt's metadata and body
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let Some(id) = PromptId::parse(prompt_id) else {
        let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
        anyhow::bail!(
            "Unknown prompt ID: {} (available: {})",
            prompt_id,
            known.join(", ")
        );
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    let source = match &prompt.override_path {
        Some(path) if prompt.is_override => format!("override ({})", path.display()),
        _ => "built-in".to_string(),
    };
    println!(
        "# {} v{} [{}] from {}",
        prompt.metadata.id, prompt.metadata.version, prompt.metadata.task_type, source
    );
    println!();
    println!("{}", prompt.content);

    Ok(())
}

/// Print the override directory
pub fn cmd_prompts_path() -> Result<()> {
    let dir = default_prompts_dir()
        .ok_or_else(|| anyhow::anyhow!("No data directory available on this system"))?;
    println!("{}", dir.display());
    if !dir.exists() {
        eprintln!("(does not exist yet; create it to add overrides)");
    }
    Ok(())
}
