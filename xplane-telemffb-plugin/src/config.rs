//! Bridge configuration, read once at plugin start.
//!
//! The file is optional. Every field has a default, so a partial file only
//! overrides what it names:
//!
//! ```json
//! { "telemetry_addr": "192.168.1.20:34390", "log_level": "debug" }
//! ```

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use telem_protocol::{COMMAND_PORT, DEFAULT_RECV_BUFFER_LEN, TELEMETRY_PORT};
use tracing_subscriber::filter::LevelFilter;

/// Location of the config file, relative to the simulator root.
pub const CONFIG_PATH: &str = "Resources/plugins/TelemFFB-XPP/telemffb-xpp.json";
/// Default debug log file, relative to the simulator working directory.
pub const DEFAULT_DEBUG_LOG: &str = "Log_TelemFFB-XPP.txt";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Destination of outbound telemetry datagrams.
    pub telemetry_addr: SocketAddr,
    /// Local address the command socket binds to.
    pub command_addr: SocketAddr,
    /// Inbound datagram limit in bytes. Longer datagrams are truncated.
    pub recv_buffer_len: usize,
    /// Upper bound on one blocking receive.
    pub recv_timeout_ms: u64,
    /// `None` disables the file log.
    pub debug_log: Option<PathBuf>,
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            telemetry_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::new(127, 255, 255, 255),
                TELEMETRY_PORT,
            )),
            command_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, COMMAND_PORT)),
            recv_buffer_len: DEFAULT_RECV_BUFFER_LEN,
            recv_timeout_ms: 250,
            debug_log: Some(PathBuf::from(DEFAULT_DEBUG_LOG)),
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Parse a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but falls back to defaults on any error.
    ///
    /// The error is returned alongside so the caller can report it once
    /// logging is up.
    pub fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        match Self::load(path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms.max(1))
    }

    /// Unknown level names fall back to `INFO`.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::INFO)
    }
}
