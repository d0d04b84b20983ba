//! CLI argument definitions for the `perfdesk` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Perfdesk - inspect and edit a performance-management store snapshot.
#[derive(Parser, Debug)]
#[command(name = "perfdesk", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON snapshot of the store to operate on.
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Write a default configuration file if none exists.
    Init,
    /// List all employees.
    Employees,
    /// List an employee's goals.
    Goals {
        #[arg(long)]
        employee: String,
    },
    /// List feedback about an employee.
    Feedback {
        #[arg(long)]
        employee: String,
    },
    /// List an employee's performance metrics.
    Metrics {
        #[arg(long)]
        employee: String,
    },
    /// List a user's notifications, newest first.
    Notifications {
        #[arg(long)]
        user: String,
    },
    /// Mark all of a user's notifications as read.
    MarkRead {
        #[arg(long)]
        user: String,
    },
    /// Create a sample set of notifications for a user.
    DemoNotifications {
        #[arg(long)]
        user: String,
    },
    /// List leadership ratings given to an admin or by an employee.
    Ratings {
        #[arg(long, conflicts_with = "employee", required_unless_present = "employee")]
        admin: Option<String>,
        #[arg(long)]
        employee: Option<String>,
    },
    /// Assign a goal to an employee.
    AddGoal {
        #[arg(long)]
        employee: String,
        #[arg(long)]
        title: String,
        /// Target date; defaults to now.
        #[arg(long = "target-date")]
        target_date: Option<String>,
    },
    /// Ask the admins for feedback on behalf of an employee.
    RequestFeedback {
        #[arg(long)]
        employee: String,
        /// Feedback topic, e.g. `review`. The request prefix is added if
        /// missing.
        #[arg(long)]
        category: String,
    },
}

impl Command {
    /// Whether the command changes the store, so the snapshot must be saved.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::MarkRead { .. }
                | Command::DemoNotifications { .. }
                | Command::AddGoal { .. }
                | Command::RequestFeedback { .. }
        )
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PERFDESK_CONFIG env var > ~/.perfdesk/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PERFDESK_CONFIG") {
            return PathBuf::from(p);
        }
        home_dir()
            .map(|home| home.join(".perfdesk").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Resolve the snapshot path.
    ///
    /// Priority: --snapshot flag > PERFDESK_SNAPSHOT env var > config file value.
    pub fn resolve_snapshot_path(&self, config_value: &str) -> PathBuf {
        if let Some(ref p) = self.snapshot {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PERFDESK_SNAPSHOT") {
            return PathBuf::from(p);
        }
        expand_home(config_value)
    }

    /// Resolve the log filter directive used when `RUST_LOG` is not set.
    ///
    /// Priority: --log-level flag > config file value > "info".
    pub fn resolve_log_level(&self, config_value: Option<&str>) -> String {
        self.log_level
            .clone()
            .or_else(|| config_value.map(str::to_string))
            .unwrap_or_else(|| "info".to_string())
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
