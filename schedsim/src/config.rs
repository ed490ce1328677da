use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::memory::DEFAULT_TOTAL_MEMORY_MB;
use crate::metrics::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SNAPSHOT_HISTORY};

pub const CONFIG_ENV: &str = "SCHEDSIM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/schedsim/schedsim.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Real-time period between ticks.
    pub tick_interval_ms: u64,
    pub total_memory_mb: u64,
    pub history_capacity: usize,
    /// How many of the retained entries a snapshot carries.
    pub snapshot_history: usize,
    /// Fixed seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
    pub autostart: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            total_memory_mb: DEFAULT_TOTAL_MEMORY_MB,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            snapshot_history: DEFAULT_SNAPSHOT_HISTORY,
            seed: None,
            autostart: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `$SCHEDSIM_CONFIG`, or the system path. A missing file is
    /// not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            info!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        let config = config.validate()?;
        info!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn validate(mut self) -> Result<Self> {
        let sim = &mut self.simulation;
        if sim.tick_interval_ms == 0 {
            bail!("simulation.tick_interval_ms must be positive");
        }
        if sim.total_memory_mb == 0 {
            bail!("simulation.total_memory_mb must be positive");
        }
        if sim.history_capacity == 0 {
            bail!("simulation.history_capacity must be positive");
        }
        sim.snapshot_history = sim.snapshot_history.min(sim.history_capacity);
        Ok(self)
    }
}
