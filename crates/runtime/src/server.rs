//! Unix domain socket server (§9): newline-delimited JSON, one command per
//! connection except `Subscribe`, which stays open and streams progress
//! events until the client disconnects.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::commands::{ClientCommand, DaemonStatus, EngineStatus, ServerEvent};
use crate::engines::{Shared, run_cards_daily, run_cards_weekly, run_extraction, run_sync};

pub async fn serve(
    shared: Arc<Shared>,
    socket_path: &str,
    shutdown_tx: watch::Sender<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    let started_at = Instant::now();
    info!(path = socket_path, "daemon listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let shared = shared.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, shared, started_at, shutdown_tx).await {
                        warn!(error = %err, "connection handling failed");
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    shared: Arc<Shared>,
    started_at: Instant,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let command: ClientCommand = match serde_json::from_str(line.trim()) {
        Ok(command) => command,
        Err(err) => {
            send_event(&mut write_half, &ServerEvent::Error(format!("malformed command: {err}"))).await?;
            return Ok(());
        }
    };

    match command {
        ClientCommand::Ping => {
            send_event(&mut write_half, &ServerEvent::Ack("pong".to_string())).await?;
        }
        ClientCommand::Subscribe => {
            let mut rx = shared.progress.subscribe();
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if send_event(&mut write_half, &ServerEvent::Progress(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(n, "subscribe client lagged; events dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        ClientCommand::GetStatus => {
            let status = build_status(&shared, started_at).await;
            send_event(&mut write_half, &ServerEvent::Status(status)).await?;
        }
        ClientCommand::TriggerSync { mode, pipeline, vault, dry_run } => {
            let result = run_sync(&shared, mode, pipeline.as_deref(), vault.as_deref(), dry_run).await;
            respond_to_trigger(&mut write_half, result, "sync").await?;
        }
        ClientCommand::TriggerExtraction { vault } => {
            let result = run_extraction(&shared, vault.as_deref()).await;
            respond_to_trigger(&mut write_half, result, "extraction").await?;
        }
        ClientCommand::TriggerCardDiscovery { weekly, vault, dry_run } => {
            let result = if weekly {
                run_cards_weekly(&shared, vault.as_deref(), dry_run).await
            } else {
                run_cards_daily(&shared, vault.as_deref(), dry_run).await
            };
            respond_to_trigger(&mut write_half, result, "card_discovery").await?;
        }
        ClientCommand::Shutdown => {
            send_event(&mut write_half, &ServerEvent::Ack("shutting down".to_string())).await?;
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}

async fn respond_to_trigger(
    write_half: &mut tokio::net::unix::OwnedWriteHalf,
    result: Result<()>,
    engine: &str,
) -> Result<()> {
    match result {
        Ok(()) => send_event(write_half, &ServerEvent::Ack(format!("{engine} run complete"))).await,
        Err(err) => send_event(write_half, &ServerEvent::Error(format!("{engine} run failed: {err}"))).await,
    }
}

async fn send_event(write_half: &mut tokio::net::unix::OwnedWriteHalf, event: &ServerEvent) -> Result<()> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn build_status(shared: &Shared, started_at: Instant) -> DaemonStatus {
    DaemonStatus {
        vaults: shared.vaults.iter().map(|v| v.id.clone()).collect(),
        sync: EngineStatus {
            last_run_at: *shared.sync_last_run.lock().await,
            running: shared.sync_guard.is_running(),
        },
        extraction: EngineStatus {
            last_run_at: *shared.extraction_last_run.lock().await,
            running: shared.extraction_guard.is_running(),
        },
        card_discovery: EngineStatus {
            last_run_at: *shared.cards_last_run.lock().await,
            running: shared.cards_guard.is_running(),
        },
        uptime_secs: started_at.elapsed().as_secs(),
        recovered_on_last_start: shared.recovered_sandboxes.clone(),
    }
}
