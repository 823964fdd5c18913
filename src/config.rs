//! Runtime configuration.
//!
//! Everything has a safe default so the binary runs with no config file;
//! a JSON file can override any section.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostbackConfig {
    /// Partner origins allowed to deliver postbacks.
    pub allowed_ips: Vec<IpAddr>,
    /// Shared secret required on the callback-URL binding when set.
    pub secret: Option<String>,
    /// Skip origin validation entirely. Local testing only; a production
    /// deployment must not ship with this enabled.
    pub allow_unverified_origin: bool,
}

impl Default for PostbackConfig {
    fn default() -> Self {
        Self {
            allowed_ips: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            secret: None,
            allow_unverified_origin: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Bound on read-modify-write retries for a contended account.
    pub max_commit_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub postback: PostbackConfig,
    pub ledger: LedgerConfig,
    /// Bearer token for the operator API. With no token configured the
    /// operator surface rejects every call.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
