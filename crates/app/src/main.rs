//! Line-oriented driver for the produce core.
//!
//! Reads one JSON command per line from stdin, dispatches it through the
//! command bus and writes one JSON result per line to stdout. Committed
//! events forwarded to the ledger channel are logged.

use std::process::ExitCode;

use app::{AppError, Application, Config, StorageBackend, telemetry};
use domain::ProduceCommand;
use event_store::{EventEnvelope, EventStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}

/// Logs every event handed to the ledger channel.
async fn drain_ledger(mut ledger: mpsc::Receiver<EventEnvelope>) {
    while let Some(event) = ledger.recv().await {
        metrics::counter!("ledger_entries").increment(1);
        tracing::info!(
            target: "ledger",
            event_id = %event.event_id,
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            version = %event.version,
            "ledger entry"
        );
    }
}

async fn handle_line<S: EventStore + Clone + 'static>(app: &Application<S>, line: &str) -> String {
    let command: ProduceCommand = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(error = %err, "malformed command line");
            return serde_json::json!({ "ok": false, "detail": err.to_string() }).to_string();
        }
    };

    match app.send(command).await {
        Ok(outcome) => serde_json::json!({
            "ok": true,
            "aggregateId": outcome.aggregate_id,
            "version": outcome.version,
            "events": outcome.events,
        }),
        Err(err) => serde_json::json!({ "ok": false, "error": err.to_response() }),
    }
    .to_string()
}

async fn run<S: EventStore + Clone + 'static>(
    app: Application<S>,
    ledger: mpsc::Receiver<EventEnvelope>,
) -> Result<(), AppError> {
    let replayed = app.catch_up().await?;
    tracing::info!(replayed, "read models caught up");

    tokio::spawn(drain_ledger(ledger));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                println!("{}", handle_line(&app, &line).await);
            }
            () = &mut shutdown => break,
        }
    }

    Ok(())
}

async fn start(config: Config) -> Result<(), AppError> {
    match config.storage {
        StorageBackend::Memory => {
            let (app, ledger) = Application::in_memory(&config)?;
            run(app, ledger).await
        }
        StorageBackend::Postgres => {
            let (app, ledger) = Application::postgres(&config).await?;
            run(app, ledger).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    if let Err(err) = telemetry::init(&config) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    tracing::info!(storage = ?config.storage, "starting produce core");

    match start(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "fatal error");
            ExitCode::FAILURE
        }
    }
}
