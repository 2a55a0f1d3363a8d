//! Configuration for the data node
//!
//! Loaded from the file passed on the command line (JSON or TOML, picked by
//! extension) with `DATANODE_*` environment variables layered on top.

use crate::common::{discover_local_ip, upload_dir_name, Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Data node configuration
///
/// Older node files spell the keys `ID`, `ClientNodePort`, `DataNodePort` and
/// `MasterNodePort`. Those names are accepted as aliases, in original or
/// lower case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataNodeConfig {
    /// Numeric node ID reported to the coordinator
    #[serde(alias = "ID")]
    pub id: i32,

    /// Port serving client uploads/downloads
    #[serde(
        alias = "ClientNodePort",
        alias = "clientnodeport",
        deserialize_with = "deserialize_port"
    )]
    pub client_port: u16,

    /// Port serving replication traffic from other data nodes
    #[serde(
        alias = "DataNodePort",
        alias = "datanodeport",
        deserialize_with = "deserialize_port"
    )]
    pub peer_port: u16,

    /// Port serving coordinator-initiated calls
    #[serde(
        alias = "MasterNodePort",
        alias = "masternodeport",
        deserialize_with = "deserialize_port"
    )]
    pub master_port: u16,

    /// Advertised IP; discovered from the outbound interface when unset
    #[serde(default)]
    pub ip: Option<String>,

    /// Coordinator endpoint
    #[serde(default = "default_master_addr")]
    pub master_addr: String,

    /// Parent directory of `uploaded_<ip>_<port>` (empty = working directory)
    #[serde(default)]
    pub storage_root: PathBuf,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_chunk_size")]
    pub replication_chunk_size: usize,

    /// Largest request or response body accepted per call
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Dial timeout for outbound connections
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Abandon upload sessions idle for this long (0 disables)
    #[serde(default = "default_session_idle_timeout")]
    pub session_idle_timeout_secs: u64,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

fn default_master_addr() -> String {
    "http://localhost:50061".to_string()
}
fn default_heartbeat_interval() -> u64 {
    1000
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_session_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Accepts `9001`, `"9001"` or `":9001"`.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => parse_port(&text).map_err(serde::de::Error::custom),
    }
}

/// Parse a listening port, tolerating the `:port` form.
pub fn parse_port(text: &str) -> Result<u16> {
    let digits = text.trim();
    let digits = digits.strip_prefix(':').unwrap_or(digits);
    digits
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid port: {:?}", text)))
}

impl DataNodeConfig {
    /// Minimal config with defaults for everything but ports and ID
    pub fn new(id: i32, client_port: u16, peer_port: u16, master_port: u16) -> Self {
        Self {
            id,
            client_port,
            peer_port,
            master_port,
            ip: None,
            master_addr: default_master_addr(),
            storage_root: PathBuf::new(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            replication_chunk_size: default_chunk_size(),
            max_message_size: default_max_message_size(),
            connect_timeout_ms: default_connect_timeout(),
            session_idle_timeout_secs: default_session_idle_timeout(),
            log_level: default_log_level(),
        }
    }

    /// Load from a config file, then apply `DATANODE_*` overrides
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("DATANODE").try_parsing(true))
            .build()?;

        let config: DataNodeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ports = [self.client_port, self.peer_port, self.master_port];
        if ports.contains(&0) {
            return Err(Error::InvalidConfig("ports must be non-zero".into()));
        }
        if ports[0] == ports[1] || ports[0] == ports[2] || ports[1] == ports[2] {
            return Err(Error::InvalidConfig(format!(
                "client, peer and master ports must differ (got {}, {}, {})",
                ports[0], ports[1], ports[2]
            )));
        }
        if self.replication_chunk_size == 0 || self.max_message_size == 0 {
            return Err(Error::InvalidConfig(
                "chunk and message sizes must be non-zero".into(),
            ));
        }
        if self.replication_chunk_size > self.max_message_size {
            return Err(Error::InvalidConfig(format!(
                "replication chunk size {} exceeds max message size {}",
                self.replication_chunk_size, self.max_message_size
            )));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.session_idle_timeout_secs))
    }

    /// Resolve the node's identity, discovering the IP if not configured
    pub fn identity(&self) -> NodeIdentity {
        let ip = match &self.ip {
            Some(ip) => ip.clone(),
            None => match discover_local_ip() {
                Ok(ip) => ip.to_string(),
                Err(e) => {
                    tracing::warn!("Cannot discover local IP ({}), using 127.0.0.1", e);
                    "127.0.0.1".to_string()
                }
            },
        };

        NodeIdentity {
            id: self.id,
            ip,
            client_port: self.client_port,
            peer_port: self.peer_port,
            master_port: self.master_port,
        }
    }
}

/// Who this node is; fixed after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub id: i32,
    pub ip: String,
    pub client_port: u16,
    pub peer_port: u16,
    pub master_port: u16,
}

impl NodeIdentity {
    /// Directory holding every file stored by this node
    pub fn upload_dir(&self) -> String {
        upload_dir_name(&self.ip, self.client_port)
    }

    /// Port list in the order the coordinator expects: master, client, peer
    pub fn port_numbers(&self) -> Vec<String> {
        [self.master_port, self.client_port, self.peer_port]
            .iter()
            .map(|port| format!(":{}", port))
            .collect()
    }
}
