//! Challenge Wizard · "Create Challenge" backend
//!
//! - Axum HTTP + WebSocket API over an in-memory wizard state controller
//! - Pluggable notification, submission and invite-code collaborators
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   WIZARD_CONFIG_PATH  : path to TOML config (outcome defaults, companies, notices)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod rewards;
mod config;
mod error;
mod collab;
mod wizard;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: session store, config, default collaborators.
  let state = Arc::new(AppState::new());
  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], listen_port()));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "challenge_wizard", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "challenge_wizard", "server stopped");
  Ok(())
}

fn listen_port() -> u16 {
  match std::env::var("PORT") {
    Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
      warn!(target: "challenge_wizard", %raw, "PORT is not a valid port number; using 3000");
      3000
    }),
    Err(_) => 3000,
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "challenge_wizard", error = %e, "could not listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "challenge_wizard", "shutdown requested");
}
