//! Configuration loading and validation

use anyhow::{bail, Context, Result};
use estop_event_core::{
    ConnectionSupervisor, DataBlockImage, MonitorConfig, ReconnectConfig, SignalConfig, SignalType,
    StoreConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub plc: PlcConfig,
    #[serde(default)]
    pub storage: StoreConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub estop: MonitorConfig,
    pub signals: Vec<SignalConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlcConfig {
    /// JSON data block image standing in for the controller
    pub image_file: PathBuf,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Interval of the change-detection cycle
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

fn default_interval() -> u64 {
    1000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl AppConfig {
    /// Connection supervisor over the configured image and signals
    pub fn supervisor(&self) -> Result<ConnectionSupervisor<DataBlockImage>> {
        let link = DataBlockImage::from_file(&self.plc.image_file);
        ConnectionSupervisor::new(link, self.signals.clone(), self.plc.reconnect.clone())
            .context("Invalid signal configuration")
    }

    /// Check everything that can be checked without touching the controller
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.signals.is_empty() {
            errors.push("no signals configured".to_string());
        }
        let mut seen = HashSet::new();
        for signal in &self.signals {
            if !seen.insert(signal.name.as_str()) {
                errors.push(format!("duplicate signal name '{}'", signal.name));
            }
            if let Err(e) = signal
                .address
                .parse::<estop_event_core::plc::Address>()
                .and_then(|a| a.check_type(signal.signal_type))
            {
                errors.push(format!("invalid IO address for '{}': {}", signal.name, e));
            }
        }

        match self.signals.iter().find(|s| s.name == self.estop.signal) {
            Some(s) if s.signal_type != SignalType::Bit => {
                errors.push(format!("E-Stop signal '{}' must be a bit", s.name));
            }
            Some(_) => {}
            None => errors.push(format!("E-Stop signal '{}' is not configured", self.estop.signal)),
        }

        if self.polling.interval_ms == 0 {
            errors.push("polling.interval_ms must be positive".to_string());
        }
        if self.estop.polling_interval_ms == 0 {
            errors.push("estop.polling_interval_ms must be positive".to_string());
        }
        if self.storage.max_events == 0 {
            errors.push("storage.max_events must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("Configuration errors:\n  - {}", errors.join("\n  - "))
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    // Relative paths are relative to the config file
    if let Some(base) = path.parent() {
        if config.plc.image_file.is_relative() {
            config.plc.image_file = base.join(&config.plc.image_file);
        }
        if config.storage.log_dir.is_relative() {
            config.storage.log_dir = base.join(&config.storage.log_dir);
        }
    }

    Ok(config)
}
