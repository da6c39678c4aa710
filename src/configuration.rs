use config::Config;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::*;

use crate::{
    correction::CorrectionConfig,
    driver::{sim::SimConfig, BodyConfig},
    localiser::LocaliserConfig,
    navigation::NavigationConfig,
    odometer::OdometerConfig,
    pose::Pose,
};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ArenaConfig {
    /// Distance between floor gridlines, cm.
    pub grid_spacing: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            grid_spacing: 30.48,
        }
    }
}

/// World used by the `arena_nav` binary.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub start: Pose,
    /// Physical wheel separation, defaults to the model's empty track.
    pub true_track: Option<f64>,
    pub line_width: f64,
    pub max_range: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: Pose::new(15.0, 15.0, 100.0),
            true_track: None,
            line_width: 1.0,
            max_range: 200.0,
            width: None,
            height: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub body: BodyConfig,
    pub odometer: OdometerConfig,
    pub navigation: NavigationConfig,
    pub localiser: LocaliserConfig,
    pub correction: CorrectionConfig,
    pub arena: ArenaConfig,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    pub fn load_config(config: &Option<PathBuf>) -> anyhow::Result<Self> {
        let settings = if let Some(config) = config {
            info!("Using configuration from {:?}", config);
            Config::builder()
                .add_source(config::File::with_name(
                    config
                        .to_str()
                        .ok_or_else(|| anyhow::anyhow!("Failed to convert path"))?,
                ))
                .add_source(config::Environment::with_prefix("APP").separator("__"))
                .build()?
        } else {
            info!("Using default configuration");
            Config::builder()
                .add_source(config::File::with_name("config/settings").required(false))
                .add_source(config::Environment::with_prefix("APP").separator("__"))
                .build()?
        };

        Ok(settings.try_deserialize()?)
    }

    pub fn sim_config(&self) -> SimConfig {
        let simulation = &self.simulation;
        SimConfig {
            body: self.body.clone(),
            true_track: simulation.true_track.unwrap_or(self.body.track_empty),
            grid_spacing: self.arena.grid_spacing,
            line_width: simulation.line_width,
            width: simulation.width,
            height: simulation.height,
            max_range: simulation.max_range,
            ..Default::default()
        }
    }
}
