//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config, ai_client)
//! - `analyze` - Analyze a sales export and save its metrics
//! - `classify` - Decide whether a file is a sales export
//! - `mappings` - Cached column mapping commands (list, forget, clear)
//! - `history` - Saved metrics commands (list, latest, show, add)
//! - `prompts` - Prompt library management commands
//! - `status` - Database, config and AI backend status

pub mod analyze;
pub mod classify;
pub mod core;
pub mod history;
pub mod mappings;
pub mod prompts;
pub mod status;

// Re-export command functions for main.rs
pub use analyze::*;
pub use classify::*;
pub use core::*;
pub use history::*;
pub use mappings::*;
pub use prompts::*;
pub use status::*;
