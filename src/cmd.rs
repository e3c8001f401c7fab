//! Command implementations for the CLI interface.
//!
//! Each subcommand maps onto one or two calls against the remote task
//! service and renders the result as a fixed-width table on stdout. The
//! interactive dashboard lives in `tui`; everything here is scriptable.

use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use std::io;

use chrono::Local;

use crate::client::{ServiceError, TaskService};
use crate::task::{format_due_relative, truncate, Risk, Task};
use crate::tui::run::run_tui;
use crate::workflow::{AssignmentWorkflow, Notice, NoticeKind};

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive dashboard.
    Ui,

    /// List unassigned work items.
    Tasks {
        /// Free-text filter against title and work item type.
        #[arg(long)]
        filter: Option<String>,
    },

    /// List risk items, highest priority score first.
    Risks,

    /// Request AI assignment suggestions for the given work item ids.
    Suggest {
        /// Work item IDs. May be repeated.
        #[arg(long = "id", required = true)]
        ids: Vec<u64>,
        /// Bulk-assign every suggestion that carries an email.
        #[arg(long)]
        assign_all: bool,
    },

    /// Assign a single work item to a user.
    Assign {
        /// Work item ID.
        task_id: String,
        /// Assignee email address.
        email: String,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Launch the TUI against the given service.
pub fn cmd_ui(service: &dyn TaskService) {
    if let Err(e) = run_tui(service) {
        eprintln!("Terminal error: {e}");
    }
}

/// Fetch and print the unassigned-task table.
pub fn cmd_tasks(service: &dyn TaskService, filter: Option<String>) -> Result<(), ServiceError> {
    let tasks = service.fetch_unassigned_tasks()?;
    let filtered: Vec<&Task> = match filter.as_deref() {
        Some(text) if !text.is_empty() => {
            let needle = text.to_lowercase();
            tasks
                .iter()
                .filter(|t| {
                    t.title.to_lowercase().contains(&needle)
                        || t.work_item_type.to_lowercase().contains(&needle)
                })
                .collect()
        }
        _ => tasks.iter().collect(),
    };
    print_task_table(&filtered);
    println!("{} of {} task(s) shown", filtered.len(), tasks.len());
    Ok(())
}

/// Fetch and print the risk table sorted by priority score.
pub fn cmd_risks(service: &dyn TaskService) -> Result<(), ServiceError> {
    let mut risks = service.fetch_risk_items()?;
    risks.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    print_risk_table(&risks);
    Ok(())
}

/// Request suggestions for the given ids, print the review table, and
/// optionally bulk-assign them all.
pub fn cmd_suggest(
    service: &dyn TaskService,
    ids: Vec<u64>,
    assign_all: bool,
) -> Result<(), ServiceError> {
    let mut workflow = AssignmentWorkflow::new();
    let opened = workflow.request_suggestions(service, &ids);
    print_notices(workflow.drain_notices());
    if !opened {
        return Ok(());
    }

    println!(
        "{:<10} {:<30} {}",
        "Task ID", "Suggested Assignee", "Reason"
    );
    for entry in workflow.review_list() {
        println!(
            "{:<10} {:<30} {}",
            entry.task_id,
            entry.email.as_deref().unwrap_or("-"),
            entry.reason.as_deref().unwrap_or("-")
        );
    }

    if assign_all {
        workflow.assign_all(service);
        print_notices(workflow.drain_notices());
    }
    Ok(())
}

/// Assign one work item directly.
pub fn cmd_assign(
    service: &dyn TaskService,
    task_id: &str,
    email: &str,
) -> Result<(), ServiceError> {
    service.assign_task(task_id, email)?;
    println!("Task {task_id} assigned to {email}");
    Ok(())
}

/// Print shell completions to stdout.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = crate::cli::Cli::command();
    generate(shell, &mut cmd, "wb", &mut io::stdout());
}

/// Print tasks in a formatted table.
fn print_task_table(tasks: &[&Task]) {
    println!("{:<7} {:<14} {:<12} {}", "ID", "Type", "State", "Title");
    for t in tasks {
        println!(
            "{:<7} {:<14} {:<12} {}",
            t.id,
            truncate(&t.work_item_type, 14),
            truncate(&t.state, 12),
            t.title
        );
    }
}

/// Print risks in a formatted table.
fn print_risk_table(risks: &[Risk]) {
    println!(
        "{:<7} {:<10} {:<26} {:<10} {:<8} {}",
        "ID", "State", "Assigned To", "Due", "Score", "Title"
    );
    let today = Local::now().date_naive();
    for r in risks {
        let assigned = if r.assigned_to.is_empty() {
            "-"
        } else {
            &r.assigned_to
        };
        println!(
            "{:<7} {:<10} {:<26} {:<10} {:<8.1} {}",
            r.id,
            truncate(&r.state, 10),
            truncate(assigned, 26),
            format_due_relative(r.due_date, today),
            r.priority_score,
            r.title
        );
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice.kind {
            NoticeKind::Success => println!("{}", notice.message),
            NoticeKind::Warning => eprintln!("warning: {}", notice.message),
            NoticeKind::Error => eprintln!("error: {}", notice.message),
        }
    }
}
