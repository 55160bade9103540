//! Configuration data structures and their defaults.
//!
//! IO (file + env overrides) lives in `load.rs`; keep this file free of it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// First operator provisioned at startup when the directory is empty of it.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject configurations the rest of the system assumes away.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            anyhow::bail!("gateway.base_url must not be empty");
        }
        if let Some(boot) = &self.bootstrap {
            if !(1..=4).contains(&boot.priority_tier) {
                anyhow::bail!(
                    "bootstrap.priority_tier must be within 1..=4, got {}",
                    boot.priority_tier
                );
            }
            if boot.max_daily_units == 0 {
                anyhow::bail!("bootstrap.max_daily_units must be greater than 0");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Origin of the scanning service, e.g. `https://sandbox.internal`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static access token attached to every call.
    #[serde(default)]
    pub api_token: String,

    /// Process-wide TLS verification toggle; applies to all four operations.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

fn default_base_url() -> String {
    "https://sandbox.internal".to_string()
}

fn default_verify_tls() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: String::new(),
            verify_tls: default_verify_tls(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the sqlite database file.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "sandgate.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub operator_id: i64,

    #[serde(default = "default_bootstrap_units")]
    pub max_daily_units: u32,

    #[serde(default = "default_bootstrap_priority")]
    pub priority_tier: u8,

    #[serde(default = "default_bootstrap_links")]
    pub link_disclosure_allowed: bool,
}

fn default_bootstrap_units() -> u32 {
    1_000_000
}

fn default_bootstrap_priority() -> u8 {
    4
}

fn default_bootstrap_links() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional directory for a daily-rolled log file next to stderr output.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}
