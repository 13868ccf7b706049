mod config;
mod error;
mod limiter;
mod markdown;
mod memos;
mod migrate;
mod notion;
mod split;
mod state;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::migrate::{MigrateOptions, Migrator};
use crate::state::State;

#[derive(Parser)]
#[command(name = "noteporter", about = "Migrate notes from Notion to Memos")]
struct Cli {
    /// Config file (default: ~/.noteporter/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write memos to ./dry-run-output/ instead of creating them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search Notion pages and migrate them to Memos
    Migrate {
        /// Skip pages already recorded in the migration state
        #[arg(long)]
        resume: bool,
        /// Only migrate pages with this exact title (repeatable)
        #[arg(long = "filter-title")]
        filter_titles: Vec<String>,
    },
    /// Clear the migration state so pages can be migrated again
    Reset,
    /// Create a config file template
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate {
            resume,
            filter_titles,
        } => {
            let cfg = config::load(cli.config.as_deref())?;
            let state = State::load(&config::state_path()?)?;

            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
            }

            let migrator = Migrator::new(
                notion::Client::new(&cfg.notion_token),
                memos::Client::new(&cfg.memos_url, &cfg.memos_token),
                state,
                cli.dry_run,
                cancel,
            );
            migrator
                .run(MigrateOptions {
                    resume,
                    filter_titles,
                })
                .await
                .map(|_| ())
        }
        Commands::Reset => {
            let state = State::load(&config::state_path()?)?;
            state.clear()?;
            println!("Migration state has been reset");
            Ok(())
        }
        Commands::Init => {
            let path = config::write_template()?;
            println!("Configuration file created at: {}", path.display());
            println!("\nPlease edit the file and add your tokens before running migrations.");
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
