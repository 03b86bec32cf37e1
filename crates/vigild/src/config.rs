//! vigild.toml configuration parser.

use std::path::Path;

use serde::Deserialize;

use vigil_core::MonitorConfig;
use vigil_transform::TransformerValidatorConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub monitor: MonitorConfig,
    pub check: CheckConfig,
}

/// The HTTP check the daemon wires up: poll `api_url` and validate the
/// stats snapshot with the transformer change detector.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub api_url: String,
    #[serde(default = "default_check_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub transformer: TransformerValidatorConfig,
}

fn default_check_timeout_ms() -> u64 {
    5000
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
