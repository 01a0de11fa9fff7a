//! Configuration loading and resolution.
//!
//! CLI flags override config-file values; built-in defaults fill the rest.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Args;

pub const DEFAULT_BIND: &str = "0.0.0.0:42069";
pub const DEFAULT_OUTPUT: &str = "audio.raw";

/// Listener config loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct IngestConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Output file path.
    pub output: Option<String>,
    /// Origin allow-list; empty or absent accepts any origin.
    pub allowed_origins: Option<Vec<String>>,
}

impl IngestConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<IngestConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Resolved runtime configuration shared with the request handlers.
#[derive(Clone, Debug)]
pub struct ListenConfig {
    pub bind: SocketAddr,
    pub output: PathBuf,
    pub allowed_origins: Vec<String>,
}

impl ListenConfig {
    /// An empty allow-list accepts any origin, including requests that carry
    /// no `Origin` header at all (embedded clients usually don't send one).
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        match origin {
            Some(origin) => self.allowed_origins.iter().any(|allowed| allowed == origin),
            None => false,
        }
    }
}

/// Merge CLI args over file config and apply defaults.
pub fn resolve(args: &Args, file: IngestConfig) -> Result<ListenConfig> {
    let bind = match args.bind {
        Some(addr) => addr,
        None => {
            let raw = file.bind.as_deref().unwrap_or(DEFAULT_BIND);
            raw.parse()
                .with_context(|| format!("parse bind address {raw}"))?
        }
    };

    let output = args
        .output
        .clone()
        .or_else(|| file.output.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    Ok(ListenConfig {
        bind,
        output,
        allowed_origins: file.allowed_origins.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["audio-ingest"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn defaults_when_nothing_given() {
        let cfg = resolve(&args(&[]), IngestConfig::default()).unwrap();
        assert_eq!(cfg.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.output, PathBuf::from(DEFAULT_OUTPUT));
        assert!(cfg.allowed_origins.is_empty());
    }

    #[test]
    fn file_values_parse() {
        let file: IngestConfig = toml::from_str(
            r#"
            bind = "127.0.0.1:9000"
            output = "/tmp/mic.raw"
            allowed_origins = ["http://device.local"]
            "#,
        )
        .unwrap();
        let cfg = resolve(&args(&[]), file).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.output, PathBuf::from("/tmp/mic.raw"));
        assert_eq!(cfg.allowed_origins, vec!["http://device.local".to_string()]);
    }

    #[test]
    fn cli_overrides_file() {
        let file: IngestConfig = toml::from_str(
            r#"
            bind = "127.0.0.1:9000"
            output = "/tmp/mic.raw"
            "#,
        )
        .unwrap();
        let cfg = resolve(&args(&["--bind", "127.0.0.1:9001", "--output", "other.raw"]), file)
            .unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:9001".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.output, PathBuf::from("other.raw"));
    }

    #[test]
    fn bad_bind_in_file_is_an_error() {
        let file: IngestConfig = toml::from_str(r#"bind = "not-an-addr""#).unwrap();
        assert!(resolve(&args(&[]), file).is_err());
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let cfg = resolve(&args(&[]), IngestConfig::default()).unwrap();
        assert!(cfg.origin_allowed(Some("http://anywhere")));
        assert!(cfg.origin_allowed(None));
    }

    #[test]
    fn allow_list_matches_exactly() {
        let mut cfg = resolve(&args(&[]), IngestConfig::default()).unwrap();
        cfg.allowed_origins = vec!["http://device.local".to_string()];
        assert!(cfg.origin_allowed(Some("http://device.local")));
        assert!(!cfg.origin_allowed(Some("http://device.local.evil")));
        assert!(!cfg.origin_allowed(None));
    }
}
