//! Simulated arena for headless runs and tests.
//!
//! One [`SimulatedArena`] owns the true robot state. Clones of it act as the
//! wheel driver, the ultrasonic sensor, the line sensor and the gyroscope,
//! all looking at the same world. Time is read from [`tokio::time::Instant`]
//! so tests running with paused time are fully deterministic.

use super::{
    wheel_arc, BodyConfig, DistanceReading, DistanceSensor, Gyroscope, LightSensor, WheelDriver,
};
use crate::{pose::Pose, wheel_command::WheelCommand};
use anyhow::Result;
use async_trait::async_trait;
use nalgebra as na;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tracing::trace;

/// Raw value the simulated ultrasonic sensor reports when nothing echoes back.
pub const NO_RETURN_SENTINEL: f64 = 255.0;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub body: BodyConfig,
    /// Wheel separation of the physical robot, which may differ from the model.
    pub true_track: f64,
    pub grid_spacing: f64,
    pub line_width: f64,
    /// Far walls. The near walls always sit on `x = 0` and `y = 0`.
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub max_range: f64,
    pub floor_reflectance: f64,
    pub line_reflectance: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let body = BodyConfig::default();
        Self {
            true_track: body.track_empty,
            body,
            grid_spacing: 30.48,
            line_width: 1.0,
            width: None,
            height: None,
            max_range: 200.0,
            floor_reflectance: 0.6,
            line_reflectance: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WheelMotion {
    Velocity { speed: f64 },
    Rotating { remaining: f64, speed: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Wheel {
    tacho: f64,
    motion: WheelMotion,
}

impl Wheel {
    fn new() -> Self {
        Self {
            tacho: 0.0,
            motion: WheelMotion::Velocity { speed: 0.0 },
        }
    }

    /// Advance by `dt` seconds and return the rotation in degrees.
    fn step(&mut self, dt: f64) -> f64 {
        match self.motion {
            WheelMotion::Velocity { speed } => {
                let delta = speed * dt;
                self.tacho += delta;
                delta
            }
            WheelMotion::Rotating { remaining, speed } => {
                let reach = speed.abs() * dt;
                let delta = if remaining.abs() <= reach {
                    self.motion = WheelMotion::Velocity { speed: 0.0 };
                    remaining
                } else {
                    self.motion = WheelMotion::Rotating {
                        remaining: remaining - reach.copysign(remaining),
                        speed,
                    };
                    reach.copysign(remaining)
                };
                self.tacho += delta;
                delta
            }
        }
    }

    fn is_moving(&self) -> bool {
        match self.motion {
            WheelMotion::Velocity { speed } => speed != 0.0,
            WheelMotion::Rotating { remaining, .. } => remaining != 0.0,
        }
    }
}

#[derive(Debug)]
struct World {
    config: SimConfig,
    truth: Pose,
    gyro_angle: f64,
    left: Wheel,
    right: Wheel,
    last_update: Instant,
}

impl World {
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        if dt <= 0.0 {
            return;
        }
        let left = wheel_arc(self.left.step(dt), self.config.body.wheel_radius);
        let right = wheel_arc(self.right.step(dt), self.config.body.wheel_radius);
        let delta_theta = (left - right) / self.config.true_track;
        let distance = (left + right) / 2.0;
        // chord of the arc, travelled along the mid-step heading
        let chord = if delta_theta.abs() < 1e-12 {
            distance
        } else {
            2.0 * (distance / delta_theta) * (delta_theta / 2.0).sin()
        };
        let heading = self.truth.theta.to_radians() + delta_theta / 2.0;
        self.truth.x += chord * heading.sin();
        self.truth.y += chord * heading.cos();
        self.truth.theta = crate::pose::normalize_degrees(
            self.truth.theta + delta_theta.to_degrees(),
        );
        self.gyro_angle += delta_theta.to_degrees();
    }

    fn ray_distance(&self) -> f64 {
        let direction = self.truth.heading_vector();
        let origin = self.truth.position();
        let mut hits = Vec::with_capacity(4);
        if direction.x < 0.0 {
            hits.push(origin.x / -direction.x);
        }
        if direction.y < 0.0 {
            hits.push(origin.y / -direction.y);
        }
        if let Some(width) = self.config.width {
            if direction.x > 0.0 {
                hits.push((width - origin.x) / direction.x);
            }
        }
        if let Some(height) = self.config.height {
            if direction.y > 0.0 {
                hits.push((height - origin.y) / direction.y);
            }
        }
        hits.into_iter()
            .filter(|distance| *distance >= 0.0)
            .fold(f64::INFINITY, f64::min)
    }

    fn line_sensor_position(&self) -> na::Point2<f64> {
        let offset = self.config.body.line_sensor_offset;
        let rotation = na::Rotation2::new(-self.truth.theta.to_radians());
        // robot frame: +x right, +y forward
        self.truth.position() + rotation * na::Vector2::new(-offset.left, -offset.back)
    }

    fn on_line(&self) -> bool {
        let sensor = self.line_sensor_position();
        let spacing = self.config.grid_spacing;
        let half_width = self.config.line_width / 2.0;
        let near = |value: f64| (value - (value / spacing).round() * spacing).abs() <= half_width;
        near(sensor.x) || near(sensor.y)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedArena {
    world: Arc<Mutex<World>>,
}

impl SimulatedArena {
    pub fn new(config: SimConfig, start: Pose) -> Self {
        Self {
            world: Arc::new(Mutex::new(World {
                config,
                truth: start,
                gyro_angle: 0.0,
                left: Wheel::new(),
                right: Wheel::new(),
                last_update: Instant::now(),
            })),
        }
    }

    fn with_world<T>(&self, action: impl FnOnce(&mut World) -> T) -> T {
        let mut world = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        world.advance();
        action(&mut world)
    }

    /// Where the robot really is.
    pub fn truth(&self) -> Pose {
        self.with_world(|world| world.truth)
    }

    pub fn set_truth(&self, pose: Pose) {
        self.with_world(|world| world.truth = pose);
    }

    /// Change the physical wheel separation, e.g. after picking something up.
    pub fn set_true_track(&self, track: f64) {
        self.with_world(|world| world.config.true_track = track);
    }
}

#[async_trait]
impl WheelDriver for SimulatedArena {
    async fn send(&mut self, command: WheelCommand) -> Result<()> {
        trace!(?command, "sim wheels");
        self.with_world(|world| {
            world.left.motion = WheelMotion::Velocity {
                speed: command.left(),
            };
            world.right.motion = WheelMotion::Velocity {
                speed: command.right(),
            };
        });
        Ok(())
    }

    async fn rotate(&mut self, left_degrees: f64, right_degrees: f64, speed: f64) -> Result<()> {
        trace!(left_degrees, right_degrees, speed, "sim rotate");
        self.with_world(|world| {
            world.left.motion = WheelMotion::Rotating {
                remaining: left_degrees,
                speed,
            };
            world.right.motion = WheelMotion::Rotating {
                remaining: right_degrees,
                speed,
            };
        });
        Ok(())
    }

    async fn is_moving(&mut self) -> Result<bool> {
        Ok(self.with_world(|world| world.left.is_moving() || world.right.is_moving()))
    }

    async fn tacho_counts(&mut self) -> Result<(f64, f64)> {
        Ok(self.with_world(|world| (world.left.tacho, world.right.tacho)))
    }
}

#[async_trait]
impl DistanceSensor for SimulatedArena {
    async fn fetch_distance(&mut self) -> Result<DistanceReading> {
        let raw = self.with_world(|world| {
            let distance = world.ray_distance();
            if distance > world.config.max_range {
                NO_RETURN_SENTINEL
            } else {
                distance
            }
        });
        Ok(DistanceReading::from_raw(raw, NO_RETURN_SENTINEL))
    }
}

#[async_trait]
impl LightSensor for SimulatedArena {
    async fn fetch_reflectance(&mut self) -> Result<f64> {
        Ok(self.with_world(|world| {
            if world.on_line() {
                world.config.line_reflectance
            } else {
                world.config.floor_reflectance
            }
        }))
    }
}

#[async_trait]
impl Gyroscope for SimulatedArena {
    async fn fetch_angle(&mut self) -> Result<f64> {
        Ok(self.with_world(|world| world.gyro_angle))
    }
}
