//! Audio Ingest — a small listener that accepts a WebSocket stream from an
//! embedded microphone board (ESP32 pushing raw I2S samples) and appends each
//! received frame's payload to a local file.
//!
//! ## Flow
//! 1. **Accept**: every HTTP request on the catch-all route is upgraded to a
//!    WebSocket session; the output file is bound (create-or-truncate) before
//!    the handshake completes.
//! 2. **Drain**: the session appends frame payloads to the file verbatim until
//!    the connection errors or closes, then releases both handles.
//!
//! A failed bind is fatal; per-connection failures only end their own session.

mod cli;
mod config;
mod ingest;
mod sink;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,audio_ingest=info")
        }))
        .init();

    let file_cfg = match args.config.as_ref() {
        Some(path) => config::IngestConfig::load(path)?,
        None => config::IngestConfig::default(),
    };
    let cfg = config::resolve(&args, file_cfg)?;

    tracing::info!(
        bind = %cfg.bind,
        output = %cfg.output.display(),
        "starting audio-ingest"
    );
    if cfg.allowed_origins.is_empty() {
        tracing::info!("no origin allow-list configured; accepting any origin");
    }

    let _ = ctrlc::set_handler(move || {
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        } else {
            std::process::exit(0);
        }
    });

    let bind = cfg.bind;
    let state = web::Data::new(cfg);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .default_service(web::route().to(ingest::ingest_ws))
    })
    .bind(bind)
    .with_context(|| format!("bind {bind}"))?
    .run()
    .await?;

    Ok(())
}
