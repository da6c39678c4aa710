//! Background drift correction from floor gridlines and the gyroscope.

use crate::{
    configuration::ArenaConfig,
    driver::{Gyroscope, LightSensor, LineSensorOffset},
    pose::{min_angle, normalize_degrees, Pose, PoseHandle},
    sampler::SampleWindow,
    task::PeriodicTask,
};
use async_trait::async_trait;
use nalgebra as na;
use serde::Deserialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, trace};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CorrectionConfig {
    pub period_ms: u64,
    /// Samples in the rolling floor brightness baseline.
    pub line_window: usize,
    /// Fraction below the baseline that counts as a dark line.
    pub line_drop_ratio: f64,
    pub line_confirm_samples: u32,
    /// Never move the pose further than this on a single crossing, cm.
    pub max_snap_distance: f64,
    /// Headings within this many degrees of an axis only snap that axis.
    pub axis_band: f64,
    pub gyro_tolerance: f64,
    pub gyro_confirm_samples: u32,
    /// Set when the gyroscope counts clockwise rotation as positive.
    pub gyro_clockwise: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            line_window: 5,
            line_drop_ratio: 0.3,
            line_confirm_samples: 2,
            max_snap_distance: 5.0,
            axis_band: 20.0,
            gyro_tolerance: 1.0,
            gyro_confirm_samples: 3,
            gyro_clockwise: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMode {
    Off,
    LineCorrection,
    GyroAssisted,
}

/// Switches shared between the motion controller and the drift corrector.
#[derive(Debug, Clone, Default)]
pub struct CorrectionFlags {
    enabled: Arc<AtomicBool>,
    gyro_assist: Arc<AtomicBool>,
}

impl CorrectionFlags {
    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            debug!(enabled, "drift correction toggled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn start_gyro_assist(&self) {
        if !self.gyro_assist.swap(true, Ordering::AcqRel) {
            info!("gyro assist started");
        }
    }

    pub fn stop_gyro_assist(&self) {
        if self.gyro_assist.swap(false, Ordering::AcqRel) {
            info!("gyro assist stopped");
        }
    }

    pub fn is_gyro_assist_active(&self) -> bool {
        self.gyro_assist.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> CorrectionMode {
        match (self.is_enabled(), self.is_gyro_assist_active()) {
            (false, _) => CorrectionMode::Off,
            (true, false) => CorrectionMode::LineCorrection,
            (true, true) => CorrectionMode::GyroAssisted,
        }
    }
}

/// Debounces a downward light sensor into single line crossings.
#[derive(Debug)]
struct LineDetector {
    baseline: SampleWindow,
    drop_ratio: f64,
    confirm: u32,
    dark_count: u32,
    armed: bool,
}

impl LineDetector {
    fn new(config: &CorrectionConfig) -> Self {
        Self {
            baseline: SampleWindow::new(config.line_window),
            drop_ratio: config.line_drop_ratio,
            confirm: config.line_confirm_samples.max(1),
            dark_count: 0,
            armed: true,
        }
    }

    /// Returns true once per confirmed crossing.
    fn push(&mut self, reflectance: f64) -> bool {
        let Some(baseline) = self.baseline.average().filter(|_| self.baseline.is_full()) else {
            self.baseline.add(reflectance);
            return false;
        };
        if reflectance < baseline * (1.0 - self.drop_ratio) {
            self.dark_count += 1;
            if self.armed && self.dark_count >= self.confirm {
                self.armed = false;
                return true;
            }
        } else {
            self.dark_count = 0;
            self.armed = true;
            self.baseline.add(reflectance);
        }
        false
    }
}

#[derive(Debug, Clone, Copy)]
struct GyroReference {
    gyro: f64,
    theta: f64,
}

pub struct DriftCorrector {
    pose: PoseHandle,
    flags: CorrectionFlags,
    light: Box<dyn LightSensor>,
    gyro: Box<dyn Gyroscope>,
    offset: LineSensorOffset,
    grid_spacing: f64,
    config: CorrectionConfig,
    line: LineDetector,
    reference: Option<GyroReference>,
    gyro_deviations: u32,
}

impl DriftCorrector {
    pub fn new(
        pose: PoseHandle,
        flags: CorrectionFlags,
        light: Box<dyn LightSensor>,
        gyro: Box<dyn Gyroscope>,
        offset: LineSensorOffset,
        arena: &ArenaConfig,
        config: CorrectionConfig,
    ) -> Self {
        Self {
            pose,
            flags,
            light,
            gyro,
            offset,
            grid_spacing: arena.grid_spacing,
            line: LineDetector::new(&config),
            config,
            reference: None,
            gyro_deviations: 0,
        }
    }

    fn snap_to_grid(&self) {
        let spacing = self.grid_spacing;
        let band = self.config.axis_band;
        let max_snap = self.config.max_snap_distance;
        let offset = self.offset;
        let before = self.pose.get();
        let after = self.pose.update(|pose| {
            let sensor = line_sensor_position(pose, offset);
            let snap = |value: f64| (value / spacing).round() * spacing - value;
            let (dx, dy) = (snap(sensor.x), snap(sensor.y));
            let north_south = min_angle(pose.theta, 0.0).min(min_angle(pose.theta, 180.0));
            let east_west = min_angle(pose.theta, 90.0).min(min_angle(pose.theta, 270.0));
            let snap_y = if north_south <= band {
                true
            } else if east_west <= band {
                false
            } else {
                dy.abs() < dx.abs()
            };
            if snap_y && dy.abs() <= max_snap {
                pose.y += dy;
            } else if !snap_y && dx.abs() <= max_snap {
                pose.x += dx;
            }
        });
        if before != after {
            debug!(%before, %after, "gridline correction");
        } else {
            trace!(pose = %before, "gridline too far to snap");
        }
    }

    fn gyro_step(&mut self, gyro_angle: f64) {
        let reference = *self.reference.get_or_insert_with(|| {
            let reference = GyroReference {
                gyro: gyro_angle,
                theta: self.pose.get().theta,
            };
            debug!(?reference, "gyro reference captured");
            reference
        });
        let direction = if self.config.gyro_clockwise { 1.0 } else { -1.0 };
        let turned = direction * (gyro_angle - reference.gyro);
        let gyro_theta = normalize_degrees(reference.theta + turned);
        if !self.flags.is_enabled() {
            self.gyro_deviations = 0;
            return;
        }
        let pose = self.pose.get();
        if min_angle(gyro_theta, pose.theta) > self.config.gyro_tolerance {
            self.gyro_deviations += 1;
            if self.gyro_deviations >= self.config.gyro_confirm_samples.max(1) {
                debug!(odometer = pose.theta, gyro = gyro_theta, "gyro heading correction");
                self.pose.set_theta(gyro_theta);
                self.gyro_deviations = 0;
            }
        } else {
            self.gyro_deviations = 0;
        }
    }
}

fn line_sensor_position(pose: &Pose, offset: LineSensorOffset) -> na::Point2<f64> {
    let heading = pose.heading_vector();
    let right = na::Vector2::new(heading.y, -heading.x);
    pose.position() - right * offset.left - heading * offset.back
}

#[async_trait]
impl PeriodicTask for DriftCorrector {
    fn name(&self) -> &'static str {
        "drift corrector"
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.config.period_ms.max(1))
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let reflectance = self.light.fetch_reflectance().await?;
        if self.line.push(reflectance) && self.flags.is_enabled() {
            self.snap_to_grid();
        }

        if self.flags.is_gyro_assist_active() {
            let angle = self.gyro.fetch_angle().await?;
            self.gyro_step(angle);
        } else if self.reference.take().is_some() {
            self.gyro_deviations = 0;
        }
        Ok(())
    }
}
