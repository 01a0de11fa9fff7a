use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ")");

/// Audio Ingest — accepts a WebSocket stream from an embedded microphone board
/// and appends each received frame's payload to a local raw-audio file.
#[derive(Parser, Debug)]
#[command(name = "audio-ingest", version = VERSION)]
pub struct Args {
    /// Bind address, e.g. 0.0.0.0:42069
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Output file for received audio bytes
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Optional listener config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
