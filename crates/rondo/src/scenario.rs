use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A timed command script driving one simulation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One command dispatched at a simulated time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dispatch time in simulated seconds
    pub at: f64,

    /// Target controller name; defaults to the first configured one
    #[serde(default)]
    pub controller: Option<String>,

    /// Target axis index; ignored by `defer_moves`
    #[serde(default)]
    pub axis: usize,

    pub command: Command,
}

/// The command entry points exposed by a simulated axis/controller.
///
/// Speed fields are optional; zero leaves the axis caps alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Move {
        target: f64,
        #[serde(default)]
        relative: bool,
        #[serde(default)]
        min_velocity: f64,
        #[serde(default)]
        max_velocity: f64,
        #[serde(default)]
        acceleration: f64,
    },
    SetVelocity {
        velocity: f64,
        #[serde(default)]
        acceleration: f64,
    },
    Home {
        #[serde(default)]
        min_velocity: f64,
        #[serde(default)]
        max_velocity: f64,
        #[serde(default)]
        acceleration: f64,
        #[serde(default = "default_forwards")]
        forwards: bool,
    },
    Stop {
        #[serde(default)]
        acceleration: f64,
    },
    SetPosition {
        position: f64,
    },
    /// Replace an axis's limits, home, and offset outright (test-fixture
    /// call).
    Config {
        high_limit: f64,
        low_limit: f64,
        #[serde(default)]
        home: f64,
        #[serde(default)]
        start: f64,
    },
    DeferMoves {
        enable: bool,
    },
}

fn default_forwards() -> bool {
    true
}

impl Scenario {
    /// Load a scenario from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    /// Parse a scenario from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse scenario as TOML")
    }

    /// Parse a scenario from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse scenario as JSON")
    }
}
