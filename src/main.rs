//! ==============================================================================
//! main.rs - enviro host entry point
//! ==============================================================================
//!
//! purpose:
//!     wires the sensor store to its collaborators and runs them until
//!     ctrl-c:
//!     - ingest loop: drains the publish queue, the only writer of the store
//!     - simulated feed (if enabled): forwarded into the same queue
//!     - render loop: fixed cadence, redraws only when the store is dirty
//!     - web server: dashboard, json api, publish endpoint
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                       enviro host                             │
//!     │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────────┐  │
//!     │  │ ingest loop │   │ render loop │   │ web server          │  │
//!     │  │ (messages)  │   │ (1s cycle)  │   │ (port 3000)         │  │
//!     │  └──────┬──────┘   └──────┬──────┘   └──────────┬──────────┘  │
//!     │         │ write           │ read                │ read/publish│
//!     │         └─────────────────┼─────────────────────┘             │
//!     │                     ┌─────┴─────┐                             │
//!     │                     │   store   │ <- store.rs                 │
//!     │                     └───────────┘                             │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::{Context, Result};
use enviro_host::config::HostConfig;
use enviro_host::ingest::{self, SimulatedSource};
use enviro_host::render::{self, FanOut, LogRenderer, SharedFrame};
use enviro_host::server::{self, ServerState};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration (optional path as first argument)
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = HostConfig::load_or_default(config_path.as_deref());

    // step 2: logging
    enviro_host::logging::init(&config.logging.level);
    config.print_summary();

    // step 3: the store, shared by every task
    let store = Arc::new(config.build_store().context("Failed to build sensor store")?);

    // step 4: one ingest loop; every other source feeds its queue
    let (publisher, queue) = ingest::channel(config.ingest.queue_depth, config.ingest.topic_prefix.clone());
    let queue_task = tokio::spawn(ingest::run_ingest(queue, store.clone()));

    let simulated_task = if config.ingest.simulate {
        let source = SimulatedSource::new(
            store.channel_ids().collect(),
            config.ingest.topic_prefix.clone(),
            config.simulate_interval(),
        );
        tracing::info!("[STARTUP] Simulated feed every {:?}", config.simulate_interval());
        Some(tokio::spawn(ingest::forward(source, publisher.clone())))
    } else {
        None
    };

    // step 5: web server in background
    let frame = SharedFrame::default();
    if config.server.enabled {
        let bind = config.server.bind.clone();
        let state = ServerState {
            store: store.clone(),
            frame: frame.clone(),
            publisher: publisher.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = server::run_server(&bind, state).await {
                tracing::error!("[SERVER] Web server error: {:#}", e);
            }
        });
    }

    // step 6: render loop in the foreground until ctrl-c
    let renderer = FanOut::default()
        .with(LogRenderer::new(config.logging.show_sensor_data))
        .with(frame);
    tracing::info!("[RUNTIME] Rendering every {:?}", config.render_interval());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };
    render::run_render(store, renderer, config.render_interval(), shutdown).await;

    if let Some(task) = simulated_task {
        task.abort();
    }
    queue_task.abort();
    tracing::info!("[RUNTIME] Shutting down");
    Ok(())
}
