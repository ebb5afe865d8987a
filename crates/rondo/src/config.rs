use anyhow::{Context, Result};
use rondo_core::{AxisConfig, MotionLimits};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Main configuration for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler settings
    #[serde(default)]
    pub sim: SimSettings,

    /// Simulated motor controllers, each with its ordered axes
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSettings {
    /// Poll period in simulated seconds
    #[serde(default = "default_poll_period")]
    pub poll_period: f64,

    /// Hard cap on simulated run time
    #[serde(default = "default_max_time")]
    pub max_time: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            poll_period: default_poll_period(),
            max_time: default_max_time(),
        }
    }
}

/// One simulated controller and its axes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Registry name; scenarios address the controller by it
    pub name: String,

    /// Axes in index order
    #[serde(default)]
    pub axes: Vec<AxisSpec>,
}

/// Geometry and default speeds for one axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisSpec {
    pub low_limit: f64,
    pub high_limit: f64,

    #[serde(default)]
    pub home: f64,

    #[serde(default)]
    pub start: f64,

    /// Initial velocity cap (units/s)
    #[serde(default = "default_speed")]
    pub velocity: f64,

    /// Initial acceleration cap (units/s²)
    #[serde(default = "default_speed")]
    pub acceleration: f64,
}

fn default_poll_period() -> f64 {
    0.1
}

fn default_max_time() -> f64 {
    600.0
}

fn default_speed() -> f64 {
    1.0
}

impl AxisSpec {
    pub fn axis_config(&self) -> AxisConfig {
        AxisConfig {
            low_limit: self.low_limit,
            high_limit: self.high_limit,
            home: self.home,
            start: self.start,
        }
    }

    pub fn motion_limits(&self) -> MotionLimits {
        MotionLimits {
            acceleration: self.acceleration,
            velocity: self.velocity,
        }
    }
}

impl Config {
    /// Load configuration from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => {
                // Try TOML first (preferred), fall back to JSON
                Self::from_toml(&content).or_else(|_| Self::from_json(&content))
            }
        }
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config as TOML")
    }

    /// Parse configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse config as JSON")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.sim.poll_period > 0.0 && self.sim.poll_period.is_finite()) {
            anyhow::bail!("sim.poll_period must be a positive number of seconds");
        }
        if !(self.sim.max_time > 0.0) {
            anyhow::bail!("sim.max_time must be positive");
        }
        if self.controllers.is_empty() {
            anyhow::bail!("no controllers configured");
        }

        let mut seen = std::collections::HashSet::new();
        for controller in &self.controllers {
            if controller.name.is_empty() {
                anyhow::bail!("controller name cannot be empty");
            }
            if !seen.insert(controller.name.as_str()) {
                anyhow::bail!("duplicate controller name {:?}", controller.name);
            }
            if controller.axes.is_empty() {
                anyhow::bail!("controller {:?} has no axes", controller.name);
            }
            for (index, axis) in controller.axes.iter().enumerate() {
                if !(axis.low_limit < axis.high_limit) {
                    anyhow::bail!(
                        "controller {:?} axis {}: low_limit {} is not below high_limit {}",
                        controller.name,
                        index,
                        axis.low_limit,
                        axis.high_limit
                    );
                }
                if !(axis.velocity > 0.0) {
                    anyhow::bail!(
                        "controller {:?} axis {}: velocity must be positive",
                        controller.name,
                        index
                    );
                }
                if !(axis.acceleration > 0.0) {
                    anyhow::bail!(
                        "controller {:?} axis {}: acceleration must be positive",
                        controller.name,
                        index
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[sim]
poll_period = 0.05

[[controllers]]
name = "stage"

[[controllers.axes]]
low_limit = 0.0
high_limit = 100.0
home = 0.0
start = 50.0
velocity = 10.0
acceleration = 5.0
"#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.sim.poll_period, 0.05);
        assert_eq!(config.controllers.len(), 1);
        assert_eq!(config.controllers[0].axes[0].velocity, 10.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "controllers": [
                {
                    "name": "stage",
                    "axes": [
                        {"low_limit": -10.0, "high_limit": 10.0}
                    ]
                }
            ]
        }"#;

        let config = Config::from_json(json).unwrap();
        assert_eq!(config.controllers[0].name, "stage");
        // Unspecified speeds fall back to the defaults.
        assert_eq!(config.controllers[0].axes[0].velocity, 1.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.sim.poll_period, 0.1);
        assert_eq!(config.sim.max_time, 600.0);
        assert!(config.controllers.is_empty());
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let toml = r#"
[[controllers]]
name = "stage"

[[controllers.axes]]
low_limit = 10.0
high_limit = -10.0
"#;
        let config = Config::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let toml = r#"
[[controllers]]
name = "stage"

[[controllers.axes]]
low_limit = 0.0
high_limit = 1.0

[[controllers]]
name = "stage"

[[controllers.axes]]
low_limit = 0.0
high_limit = 1.0
"#;
        let config = Config::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
