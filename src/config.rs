//! Server configuration from command-line flags and environment variables.

use crate::protocol::stream::DEFAULT_MAX_FRAME_BYTES;
use crate::server::ServerOptions;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::time::Duration;

/// respkv - an in-memory key-value server speaking RESP
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "respkv", version)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "RESPKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Milliseconds between background expiry sweeps (0 disables the sweeper)
    #[arg(long, env = "RESPKV_SWEEP_INTERVAL_MS", default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Largest single message a client may send
    #[arg(long, env = "RESPKV_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    /// Log filter directive, used when RUST_LOG is not set
    #[arg(long, env = "RESPKV_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `None` when the sweeper is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["respkv"]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.sweep_interval(), Some(Duration::from_millis(100)));
        assert_eq!(config.server_options().max_frame_bytes, 8 * 1024 * 1024);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "respkv",
            "--host",
            "0.0.0.0",
            "-p",
            "6380",
            "--sweep-interval-ms",
            "0",
            "--max-frame-bytes",
            "1024",
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:6380");
        assert_eq!(config.sweep_interval(), None);
        assert_eq!(config.max_frame_bytes, 1024);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Config::try_parse_from(["respkv", "--port", "not-a-port"]).is_err());
        assert!(Config::try_parse_from(["respkv", "--port", "70000"]).is_err());
    }
}
