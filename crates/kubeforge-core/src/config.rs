//! Cluster configuration
//!
//! Stored as YAML, by default in `~/.config/kubeforge/cluster.yaml`:
//!
//! ```yaml
//! apiVersion: kubeforge.io/v1
//! name: my-cluster
//! machineController:
//!   deploy: true
//!   namespace: kube-system
//!   settleDelay: 10s
//!   deletion:
//!     interval: 5s
//!     timeout: 3m
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Namespace the machine-controller and its Cluster API objects live in
pub const DEFAULT_NAMESPACE: &str = "kube-system";

/// Cluster configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Cluster name (informational)
    #[serde(default)]
    pub name: Option<String>,

    /// Machine-controller settings
    #[serde(default)]
    pub machine_controller: MachineControllerConfig,
}

fn default_api_version() -> String {
    "kubeforge.io/v1".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            name: None,
            machine_controller: MachineControllerConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config location (`~/.config/kubeforge/cluster.yaml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kubeforge").join("cluster.yaml"))
    }

    fn validate(&self) -> Result<()> {
        let mc = &self.machine_controller;
        if mc.namespace.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "machineController.namespace cannot be empty".to_string(),
            });
        }
        mc.deletion.validate("machineController.deletion")?;
        mc.readiness.validate("machineController.readiness")?;
        Ok(())
    }
}

/// Machine-controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineControllerConfig {
    /// Whether kubeforge manages the machine-controller at all
    #[serde(default = "default_true")]
    pub deploy: bool,

    /// Namespace holding the controller and the Cluster API objects
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Delay before probing readiness, lets the scheduler react
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Machine deletion convergence window
    #[serde(default)]
    pub deletion: PollSettings,

    /// Controller/webhook readiness window
    #[serde(default)]
    pub readiness: PollSettings,
}

impl Default for MachineControllerConfig {
    fn default() -> Self {
        Self {
            deploy: true,
            namespace: default_namespace(),
            settle_delay: default_settle_delay(),
            deletion: PollSettings::default(),
            readiness: PollSettings::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(10)
}

/// Fixed-interval poll window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSettings {
    /// Delay between two observations
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Longest time to keep waiting
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.interval.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: format!("{}.interval must be greater than zero", field),
            });
        }
        Ok(())
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            timeout: default_timeout(),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_timeout() -> Duration {
    Duration::from_secs(3 * 60)
}
