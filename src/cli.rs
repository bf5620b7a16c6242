//! Command-line arguments for the `dayops` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// DayOps - daily task rollover, plan parsing and calendar sync.
///
/// Every command prints pretty JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "dayops")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace holding config/ and state/ (defaults to the current directory)
    #[arg(short = 'w', long, global = true, env = "DAYOPS_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the day's tasks, rolling them over from the last day with tasks if needed
    Tasks {
        #[arg(long)]
        date: Option<String>,
    },

    /// Add a task to the day
    Add {
        title: String,
        #[arg(long)]
        notes: Option<String>,
        /// Q1..Q4
        #[arg(long)]
        quadrant: Option<String>,
        /// morning, afternoon, evening or unscheduled
        #[arg(long)]
        period: Option<String>,
        /// Reappear every day, reset to TODO
        #[arg(long)]
        recurring: bool,
        #[arg(long)]
        date: Option<String>,
    },

    /// Update fields of a task; setting status DONE also deactivates it
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        quadrant: Option<String>,
        #[arg(long)]
        period: Option<String>,
        /// TODO, DOING or DONE
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        date: Option<String>,
    },

    /// Remove a task from the day
    Remove {
        id: String,
        #[arg(long)]
        date: Option<String>,
    },

    /// Extract the schedule from planning text (stdin unless --file is given)
    Parse {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Render the planning context for the conversational layer
    Context {
        /// Latest plan text to embed
        #[arg(long)]
        plan_file: Option<PathBuf>,
        #[arg(long)]
        date: Option<String>,
    },

    /// Distraction inbox: capture now, review at the end of the day
    Distract {
        #[command(subcommand)]
        command: DistractCommands,
    },

    /// Reconcile the calendar with the plan in the given text (stdin unless --file is given)
    Sync {
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        target: SyncTarget,
    },

    /// Reconcile the calendar with the day's active tasks that carry a time range
    SyncTasks {
        #[command(flatten)]
        target: SyncTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum DistractCommands {
    /// Capture a distraction and get back to work
    Add {
        text: String,
        #[arg(long)]
        date: Option<String>,
    },

    /// Show every distraction not yet processed
    List,

    /// Mark every pending distraction as processed
    Clear,
}

#[derive(Args, Debug, Clone)]
pub struct SyncTarget {
    #[arg(long)]
    pub date: Option<String>,
    /// clean_slate or incremental (defaults to config/calendars.json)
    #[arg(long)]
    pub strategy: Option<String>,
    /// With incremental sync, delete owned events no longer in the plan
    #[arg(long)]
    pub prune: bool,
    /// Run against an empty in-memory calendar instead of Google Calendar
    #[arg(long)]
    pub dry_run: bool,
}
