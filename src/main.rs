//! # WB - Work-item assignment dashboard
//!
//! A terminal front-end for a work-item/risk-management service: it renders
//! tables of unassigned tasks and flagged risks, and drives an AI-assisted
//! assignment workflow against a remote HTTP backend.
//!
//! ## Key Features
//!
//! - **Task board**: browse and filter unassigned work items, multi-select
//!   rows, and ask the backend's AI for assignment suggestions
//! - **Review workflow**: confirm suggestions one by one or assign all in a
//!   single bulk call, with local pruning after each server mutation
//! - **Risk board**: the service's flagged risk items, sorted by score
//! - **Multiple Interfaces**: scriptable CLI for automation + interactive
//!   TUI for visual triage
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the dashboard against a local service
//! wb ui
//!
//! # List unassigned work items
//! wb tasks --filter bug
//!
//! # Ask the AI for suggestions and assign everything it proposes
//! wb suggest --id 101 --id 102 --assign-all
//!
//! # Assign one item directly
//! wb assign 101 dev@example.com
//! ```
//!
//! The service address defaults to `http://127.0.0.1:5000`; override with
//! `--base-url` or the `WORKBOARD_URL` environment variable. Diagnostic
//! detail is logged through `tracing` (enable with `RUST_LOG=debug`);
//! user-facing outcomes go to the status bar or stdout.
//!
//! All business logic (AI-based suggestion generation, the work-item store)
//! lives behind the HTTP contract; this binary is deliberately a thin,
//! stateful front-end over it.

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod client;
pub mod cmd;
pub mod task;
pub mod workflow;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod run;
    pub mod utils;
}

use cli::Cli;
use client::HttpTaskService;
use cmd::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions need no service.
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    let service = HttpTaskService::new(&cli.base_url);

    let result = match cli.command {
        Commands::Ui => {
            cmd_ui(&service);
            Ok(())
        }
        Commands::Tasks { filter } => cmd_tasks(&service, filter),
        Commands::Risks => cmd_risks(&service),
        Commands::Suggest { ids, assign_all } => cmd_suggest(&service, ids, assign_all),
        Commands::Assign { task_id, email } => cmd_assign(&service, &task_id, &email),
        Commands::Completions { .. } => unreachable!("completions handled above"),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
