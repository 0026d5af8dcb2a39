//! `dispatchd`: runs the job dispatchers and the janitor against the store.

mod config;
mod handlers;

use actors::{SupervisorArgs, SupervisorMessage, start_supervisor};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!("Starting dispatchd");

    db::init(settings.db).await?;

    let args = SupervisorArgs::new(handlers::default_handlers())
        .with_worker_config(settings.worker)
        .with_janitor(settings.janitor)
        .with_agents(settings.agents);
    let (supervisor, handle) = start_supervisor(args).await?;

    let (event_tx, mut events) = broadcast::channel(256);
    supervisor.send_message(SupervisorMessage::Subscribe { sender: event_tx })?;
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!("{}", event.description()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event log skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    supervisor.send_message(SupervisorMessage::Shutdown)?;
    handle.await?;

    tracing::info!("dispatchd stopped");
    Ok(())
}
