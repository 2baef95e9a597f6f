//! Latihan · Exercise Generation & Grading Backend
//!
//! - Generates quiz items and learning materials through an external generative model
//! - Validates and deduplicates generated questions into a content-addressed bank
//! - Grades learner answers via an OCR / speech-to-text service
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   LATIHAN_CONFIG_PATH  : path to TOML config (endpoints, model, prompts)
//!   AI_BASE_URL          : generative model endpoint (overrides config)
//!   AI_MODEL             : model id (overrides config)
//!   TRANSCRIBE_BASE_URL  : transcription service (overrides config)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod bank;
mod config;
mod domain;
mod error;
mod generation;
mod grading;
mod logic;
mod prompt;
mod protocol;
mod routes;
mod sanitize;
mod similarity;
mod state;
mod store;
mod telemetry;
mod transcribe;
mod util;
mod validate;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::from_env()?);
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "latihan_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "latihan_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "latihan_backend", "Shutdown signal received");
}
