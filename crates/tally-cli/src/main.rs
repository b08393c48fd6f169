//! Tally CLI - Sales totals from messy exports
//!
//! Usage:
//!   tally init                  Initialize database
//!   tally analyze --file FILE   Total sales, bill rows and unique bills for an export
//!   tally classify --file FILE  Is this a sales export?
//!   tally history               Saved metrics
//!   tally history add --text T  Save figures reported as text

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use tally_core::ReportedMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Analyze {
            file,
            no_ai,
            no_cache,
            dry_run,
            json,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let ai = commands::ai_client(&config);
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let opts = commands::AnalyzeOptions {
                no_ai,
                no_cache,
                dry_run,
                json,
            };
            commands::cmd_analyze(&db, cli.user, &file, &config, ai.as_ref(), opts)
                .await
                .map(|_| ())
        }
        Commands::Classify { file, json } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let ai = commands::ai_client(&config);
            commands::cmd_classify(&file, &config, ai.as_ref(), json)
                .await
                .map(|_| ())
        }
        Commands::Mappings { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(MappingsAction::List) => commands::cmd_mappings_list(&db, cli.user),
                Some(MappingsAction::Forget { signature }) => {
                    commands::cmd_mappings_forget(&db, cli.user, &signature)
                }
                Some(MappingsAction::Clear) => commands::cmd_mappings_clear(&db, cli.user),
            }
        }
        Commands::History {
            action,
            limit,
            offset,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_history_list(&db, cli.user, limit, offset).map(|_| ()),
                Some(HistoryAction::Latest) => {
                    commands::cmd_history_latest(&db, cli.user).map(|_| ())
                }
                Some(HistoryAction::Show { id }) => {
                    commands::cmd_history_show(&db, cli.user, id).map(|_| ())
                }
                Some(HistoryAction::Add {
                    total,
                    rows,
                    unique,
                    text,
                }) => {
                    let reported = ReportedMetrics {
                        total_sales: total,
                        bill_row_count: rows,
                        unique_bill_count: unique,
                        text: text.unwrap_or_default(),
                    };
                    commands::cmd_history_add(&db, cli.user, &reported).map(|_| ())
                }
            }
        }
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Status => {
            let config = commands::load_config(cli.config.as_deref())?;
            let ai = commands::ai_client(&config);
            commands::cmd_status(&cli.db, cli.no_encrypt, &config, ai.as_ref()).await
        }
    }
}
