use anyhow::Context;
use fireguardcore::device::DeviceSelection;
use fireguardcore::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of the synthetic camera and model used by offline runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub duration_ms: u64,
    /// Chance that a generated frame contains a hot region.
    pub fire_probability: f64,
    pub frame_width: usize,
    pub frame_height: usize,
    pub auto_confirm: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            duration_ms: 5_000,
            fire_probability: 0.05,
            frame_width: 64,
            frame_height: 48,
            auto_confirm: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub bind: SocketAddr,
    pub tick_ms: u64,
    pub location_timeout_ms: u64,
    pub device_selection: DeviceSelection,
    pub settings_dir: Option<PathBuf>,
    pub labels: Vec<String>,
    pub simulation: SimulationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
            tick_ms: 33,
            location_timeout_ms: 15_000,
            device_selection: DeviceSelection::default(),
            settings_dir: None,
            labels: Vec::new(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(bind: SocketAddr, tick_ms: u64, simulation: SimulationConfig) -> Self {
        Self {
            bind,
            tick_ms,
            simulation,
            ..Self::default()
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            location_timeout: Duration::from_millis(self.location_timeout_ms),
            device_selection: self.device_selection.clone(),
            labels: self.labels.clone(),
            ..SessionConfig::default()
        }
    }
}
