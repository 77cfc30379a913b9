//! FlowCode · Interview Practice Backend
//!
//! - Axum HTTP API over layered, LLM-derived problem data
//! - Session grading and interviewer chat (OpenAI via environment variables)
//! - In-memory document store, seeded problem catalog
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   OPENAI_API_KEY    : enables OpenAI integration if present
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : structured-output model, default "gpt-4o-mini"
//!   OPENAI_CHAT_MODEL : interviewer chat model, default "gpt-4o-mini"
//!   APP_CONFIG_PATH   : path to TOML settings (tunables + optional catalog entries)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod seeds;
mod state;
mod protocol;
mod openai;
mod llm;
mod layers;
mod store;
mod source;
mod session;
mod snapshots;
mod derive;
mod pipeline;
mod feedback;
mod chat;
mod users;
mod routes;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Settings, seeded catalog, OpenAI client and problem source.
  let state = Arc::new(AppState::from_env().await?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "flowcode_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
