/**
 * SYMBION CONSOLE - Live view of the cluster node inventory
 *
 * ROLE: config bootstrap, logging, MQTT listener, stdin reader and event loop.
 *
 * ARCHITECTURE: full snapshots over MQTT -> single view -> CPU aggregate -> terminal render.
 * "add <cores>" commands go through the node HTTP API and never touch the view.
 */

use anyhow::{Context, Result};
use symbion_console::config::load_config;
use symbion_console::console::{spawn_health_ticker, spawn_input_reader, HELP};
use symbion_console::contracts::Topics;
use symbion_console::health::StreamHealth;
use symbion_console::{mqtt, CommandClient, Console, ConsoleEvent, Renderer, StreamListener, TerminalSurface};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("symbion_console=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_config().await;
    info!(
        "starting console (broker {}:{}, api {})",
        cfg.mqtt.host, cfg.mqtt.port, cfg.api.base_url
    );

    let health = StreamHealth::new();
    let client = CommandClient::new(&cfg.api).context("failed to build node API client")?;
    let (tx, rx) = mpsc::unbounded_channel();

    let listener = StreamListener::new(
        Renderer::from(&cfg.render),
        TerminalSurface::new(std::io::stdout()),
        health.clone(),
    );

    mqtt::spawn_mqtt_listener(cfg.mqtt.clone(), Topics::from(&cfg.topics), tx.clone(), health.clone());
    spawn_input_reader(tx.clone());
    spawn_health_ticker(tx.clone(), cfg.health_log_secs);

    let shutdown = tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for ctrl-c: {e}");
            return;
        }
        let _ = shutdown.send(ConsoleEvent::Shutdown);
    });

    let console = Console::new(listener, client, tx);
    if cfg.bootstrap {
        console.spawn_bootstrap();
    }
    eprintln!("{HELP}");

    let console = console.run(rx).await;
    info!("console stopped ({} add-node requests still pending)", console.pending_requests());
    Ok(())
}
