//! Network configuration for the admin server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Listener and HTTP-surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight requests.
    pub shutdown_timeout: Duration,
    /// Period of the expired cache entry and lease sweep.
    pub sweep_interval_ms: u64,
}

impl NetworkConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1 << 20,
            shutdown_timeout: Duration::from_secs(30),
            sweep_interval_ms: 1_000,
        }
    }
}
