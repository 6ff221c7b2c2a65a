//! `sla-desk`: operator CLI for the SLA engine.
//!
//! ```bash
//! # Validate a policy file and print its budgets
//! sla-desk check-policy --config sla-desk.toml
//!
//! # Classify exported ticket snapshots as of a given instant
//! sla-desk classify --tickets tickets.json --at 2026-03-02T11:00:00Z --level breached
//!
//! # Drive a desk through a timed script
//! RUST_LOG=debug sla-desk replay --script demo.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sla_desk::{render, replay};
use sla_engine::dashboard::rank;
use sla_engine::{
    Clock, DeskConfig, ServiceTicket, SystemClock, UrgencyFilter, UrgencyLevel, UrgencySummary,
};
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Desk configuration file (overrides SLA_DESK_POLICY_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the SLA policy and print the budget table
    CheckPolicy,

    /// Classify ticket snapshots from a JSON array
    Classify {
        /// JSON file holding an array of tickets
        #[arg(long)]
        tickets: PathBuf,

        /// Instant to classify at (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Only show tickets at these levels
        #[arg(long)]
        level: Vec<UrgencyLevel>,

        /// Include completed and cancelled tickets
        #[arg(long, default_value_t = false)]
        include_closed: bool,
    },

    /// Run a timed lifecycle script against an in-memory desk
    Replay {
        /// JSON replay script
        #[arg(long)]
        script: PathBuf,

        /// Print step reports as JSON lines instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config_path = DeskConfig::resolve_path(args.config.as_deref());
    let config = load_config(&config_path)?;

    match args.command {
        Command::CheckPolicy => {
            print!("{}", render::policy_table(&config.sla)?);
            println!("feedback base url: {}", config.feedback.base_url);
            info!(path = %config_path.display(), "Policy is valid");
        }
        Command::Classify {
            tickets,
            at,
            level,
            include_closed,
        } => {
            let content = std::fs::read_to_string(&tickets)
                .with_context(|| format!("failed to read tickets {}", tickets.display()))?;
            let snapshots: Vec<ServiceTicket> = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse tickets {}", tickets.display()))?;

            let now = at.unwrap_or_else(|| SystemClock.now());
            let mut filter = UrgencyFilter::new().include_closed(include_closed);
            if !level.is_empty() {
                filter = filter.levels(level);
            }

            let rows = rank(&snapshots, &config.sla, now, &filter)?;
            let summary: UrgencySummary = rows.iter().collect();
            info!(tickets = snapshots.len(), shown = rows.len(), at = %now, "Classified");

            print!("{}", render::urgency_rows(&rows));
            println!("{}", render::summary_line(&summary));
        }
        Command::Replay { script, json } => {
            let parsed = replay::ReplayScript::from_file(&script)?;
            let reports = replay::run(&parsed, &config)?;
            for report in &reports {
                if json {
                    println!("{}", serde_json::to_string(report)?);
                } else {
                    print!("{}", render::step_lines(report));
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<DeskConfig> {
    DeskConfig::from_file(path)
        .with_context(|| format!("invalid desk configuration {}", path.display()))
}
