use clap::Parser;
use std::sync::Arc;
use taskmail_cli::cli::{Cli, Command, collect_overrides};
use taskmail_cli::client::{ApiClient, render_listing};
use taskmail_core::config::{self, Config, ConfigOverrides};
use taskmail_core::error::AppError;
use taskmail_core::model::Task;
use taskmail_core::notify::notifier_from_config;
use taskmail_core::scheduler::ReminderScheduler;
use taskmail_core::storage::{JsonTaskStore, TaskStore};
use taskmail_core::sweep::{ReminderSweep, SweepReport};
use taskmail_core::task_api::CreateTaskRequest;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "taskmail=info,taskmail_core=info,tower_http=warn";

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::validation(message)
}

/// File, then environment, then `--config-override` flags.
fn resolve_config(raw_overrides: &[String]) -> Result<Config, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error {
        warn!(error = %err, "ignoring unreadable config file, using defaults");
    }

    let from_env = ConfigOverrides::from_env()?;
    let from_flags = collect_overrides(raw_overrides).map_err(AppError::config)?;
    Ok(config::merge_overrides(
        &loaded.config,
        &from_env.merge(from_flags),
    ))
}

fn open_store(config: &Config) -> Result<Arc<dyn TaskStore>, AppError> {
    let path = config.store_path()?;
    info!(path = %path.display(), "opening task store");
    Ok(Arc::new(JsonTaskStore::open(path)?))
}

fn print_task_json(task: &Task) -> Result<(), AppError> {
    let rendered = serde_json::to_string(task).map_err(|err| AppError::io(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn print_report(report: &SweepReport, json: bool) -> Result<(), AppError> {
    if json {
        let rendered =
            serde_json::to_string(report).map_err(|err| AppError::io(err.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "Sweep finished: scanned {}, reminders sent {}, alerts sent {}, overdue skipped {}, failures {}",
        report.scanned,
        report.reminders_sent,
        report.alerts_sent,
        report.skipped_overdue,
        report.failures.len()
    );
    for failure in &report.failures {
        println!(
            "  {} ({}): {}",
            failure.task_id,
            failure.threshold.label(),
            failure.error
        );
    }
    Ok(())
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<(), AppError> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let store = open_store(&config)?;
    let notifier = notifier_from_config(&config)?;
    let period = config.sweep_interval()?;
    let recipient = config.reminder_recipient();
    info!(%recipient, period_secs = period.as_secs(), "reminders enabled");

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| AppError::io(format!("failed to bind {addr}: {err}")))?;

    let shutdown = CancellationToken::new();
    let sweep = ReminderSweep::new(store.clone(), notifier, recipient);
    let scheduler = ReminderScheduler::new(sweep, period, shutdown.clone()).spawn();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal.cancel();
            }
            Err(err) => warn!(error = %err, "cannot listen for ctrl-c"),
        }
    });

    let served = taskmail_core::http::serve(listener, store, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(err) = scheduler.await {
        error!(error = %err, "reminder scheduler did not shut down cleanly");
    }
    served
}

async fn sweep_once(config: Config, json: bool) -> Result<(), AppError> {
    let store = open_store(&config)?;
    let notifier = notifier_from_config(&config)?;
    let sweep = ReminderSweep::new(store, notifier, config.reminder_recipient());

    let report = tokio::task::spawn_blocking(move || sweep.run_once(OffsetDateTime::now_utc()))
        .await
        .map_err(|err| AppError::io(format!("sweep task failed: {err}")))??;
    print_report(&report, json)
}

async fn run_command(cli: Cli) -> Result<(), AppError> {
    let json = cli.json;
    let client = ApiClient::new(&cli.api_url);

    match cli.command {
        Command::Serve { host, port } => {
            let config = resolve_config(&cli.config_override)?;
            serve(config, host, port).await?;
        }
        Command::Sweep => {
            let config = resolve_config(&cli.config_override)?;
            sweep_once(config, json).await?;
        }
        Command::List => {
            let tasks = client.list().await?;
            if json {
                let rendered =
                    serde_json::to_string(&tasks).map_err(|err| AppError::io(err.to_string()))?;
                println!("{rendered}");
            } else {
                println!("{}", render_listing(tasks));
            }
        }
        Command::Add {
            text,
            deadline,
            description,
        } => {
            let request = CreateTaskRequest {
                text: Some(text),
                deadline,
                description,
            };
            let task = client.add(&request).await?;
            if json {
                print_task_json(&task)?;
            } else {
                println!("Added task: {} ({})", task.text, task.id);
            }
        }
        Command::Toggle { id } => {
            let task = client.toggle(&id).await?;
            if json {
                print_task_json(&task)?;
            } else {
                let state = if task.completed { "completed" } else { "pending" };
                println!("Marked task {state}: {} ({})", task.text, task.id);
            }
        }
        Command::Delete { id } => {
            let deleted = client.delete(&id).await?;
            if json {
                let rendered =
                    serde_json::to_string(&deleted).map_err(|err| AppError::io(err.to_string()))?;
                println!("{rendered}");
            } else {
                println!("Deleted task: {}", deleted.id);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli).await {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
