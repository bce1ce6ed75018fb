//! Dashboard server configuration
//!
//! Read from the `[dashboard]` table of the engine's config file, so one file
//! drives both. Environment overrides use `CONFLUENCE_DASHBOARD__<FIELD>`.

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// HTTP/WebSocket bind address
    pub bind_address: String,

    /// HTTP/WebSocket port
    pub port: u16,

    /// Maximum number of concurrent WebSocket connections
    pub max_connections: usize,

    /// Messages queued per client before it is considered failed
    pub client_buffer_size: usize,

    /// Enable CORS for web browsers
    pub enable_cors: bool,

    /// Heartbeat interval in seconds, 0 disables heartbeats
    pub heartbeat_interval_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            max_connections: 100,
            client_buffer_size: 256,
            enable_cors: true,
            heartbeat_interval_secs: 30,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DashboardSection {
    dashboard: DashboardConfig,
}

impl DashboardConfig {
    /// Load the `[dashboard]` table, layered over defaults and under the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let section: DashboardSection = confluence_config::load_layered(path, "CONFLUENCE")
            .map_err(|e| DashboardError::Configuration {
                message: format!("{:#}", e),
            })?;
        section.dashboard.validate()?;
        Ok(section.dashboard)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(DashboardError::Configuration {
                message: "dashboard.max_connections must be positive".to_string(),
            });
        }
        if self.client_buffer_size == 0 {
            return Err(DashboardError::Configuration {
                message: "dashboard.client_buffer_size must be positive".to_string(),
            });
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| DashboardError::Configuration {
                message: format!("Invalid bind address: {}", e),
            })
    }
}
