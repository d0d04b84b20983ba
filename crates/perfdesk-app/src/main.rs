//! Perfdesk application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open an in-memory store from the JSON snapshot, with declared indexes
//! 4. Run one command against the data service and print the result as JSON
//! 5. Write the snapshot back when the command changed the store

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};

use perfdesk_core::config::PerfdeskConfig;
use perfdesk_core::types::{NewFeedback, NewGoal};
use perfdesk_core::DateInput;
use perfdesk_data::{DataService, DispatchReport};
use perfdesk_store::MemoryStore;

use cli::{CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

fn open_store(snapshot: &Path, config: &PerfdeskConfig) -> AppResult<MemoryStore> {
    let tree = if snapshot.exists() {
        let content = std::fs::read_to_string(snapshot)?;
        serde_json::from_str(&content)?
    } else {
        tracing::info!(path = %snapshot.display(), "No snapshot found, starting empty");
        json!({})
    };
    let store = MemoryStore::from_json(tree).with_indexes(config.store.index_rules()?)?;
    Ok(store)
}

fn save_store(snapshot: &Path, store: &MemoryStore) -> AppResult<()> {
    if let Some(parent) = snapshot.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(&store.export()?)?;
    std::fs::write(snapshot, content)?;
    tracing::info!(path = %snapshot.display(), "Snapshot saved");
    Ok(())
}

/// Summarise a write together with its notification fan-out.
fn reported<T: serde::Serialize>(record: &T, report: &DispatchReport) -> AppResult<Value> {
    for failure in &report.failures {
        tracing::warn!(user_id = ?failure.user_id, reason = %failure.reason, "Notification not delivered");
    }
    Ok(json!({
        "record": serde_json::to_value(record)?,
        "notifications": {
            "event": report.event,
            "delivered": report.delivered.len(),
            "failed": report.failures.len(),
        },
    }))
}

async fn run(service: &DataService, command: &Command, request_prefix: &str) -> AppResult<Value> {
    let output = match command {
        Command::Init => json!(null),
        Command::Employees => serde_json::to_value(service.employees().list().await?)?,
        Command::Goals { employee } => serde_json::to_value(service.goals().for_employee(employee).await?)?,
        Command::Feedback { employee } => serde_json::to_value(service.feedback().for_employee(employee).await?)?,
        Command::Metrics { employee } => serde_json::to_value(service.metrics().for_employee(employee).await?)?,
        Command::Notifications { user } => serde_json::to_value(service.notifications().for_user(user).await?)?,
        Command::MarkRead { user } => {
            let marked = service.notifications().mark_all_read(user).await?;
            json!({ "marked": marked })
        }
        Command::DemoNotifications { user } => {
            serde_json::to_value(service.generate_demo_notifications(user).await?)?
        }
        Command::Ratings { admin, employee } => {
            let ratings = match (admin, employee) {
                (Some(admin), _) => service.ratings().by_admin(admin).await?,
                (None, Some(employee)) => service.ratings().for_employee(employee).await?,
                (None, None) => Vec::new(),
            };
            serde_json::to_value(ratings)?
        }
        Command::AddGoal {
            employee,
            title,
            target_date,
        } => {
            let created = service
                .goals()
                .create_reported(NewGoal {
                    employee_id: employee.clone(),
                    title: title.clone(),
                    target_date: target_date.clone().map(DateInput::from).unwrap_or_default(),
                    ..NewGoal::default()
                })
                .await?;
            reported(&created.record, &created.notifications)?
        }
        Command::RequestFeedback { employee, category } => {
            let category = if category.starts_with(request_prefix) {
                category.clone()
            } else {
                format!("{request_prefix}{category}")
            };
            let created = service
                .feedback()
                .create_reported(NewFeedback {
                    employee_id: Some(employee.clone()),
                    category,
                    ..NewFeedback::default()
                })
                .await?;
            reported(&created.record, &created.notifications)?
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts, so its level can seed the filter.
    let config_path = args.resolve_config_path();
    let loaded = PerfdeskConfig::load_optional(&config_path)?;
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let log_level = args.resolve_log_level(config_found.then_some(config.general.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if !config_found {
        tracing::info!(path = %config_path.display(), "No config file found, using defaults");
    }

    if args.command == Command::Init {
        if config_found {
            tracing::info!(path = %config_path.display(), "Config file already exists");
        } else {
            config.save(&config_path)?;
        }
        return Ok(());
    }

    let snapshot = args.resolve_snapshot_path(&config.general.snapshot_path);
    let store = open_store(&snapshot, &config)?;
    let service = DataService::new(Arc::new(store.clone()), config.notifications.clone());

    let output = run(&service, &args.command, &config.notifications.request_prefix).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if args.command.mutates() {
        save_store(&snapshot, &store)?;
    }
    Ok(())
}
