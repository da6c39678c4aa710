pub mod sim;

use crate::wheel_command::WheelCommand;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    f64::consts::PI,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::Mutex;

/// Differential drive wheels.
///
/// Speeds are signed wheel speeds in degrees of wheel rotation per second,
/// positive drives the robot forward. Tacho counts are cumulative wheel
/// rotation in degrees.
#[async_trait]
pub trait WheelDriver: Send + Sync {
    async fn send(&mut self, command: WheelCommand) -> Result<()>;

    /// Rotate each wheel by a relative angle at `speed` and return as soon as
    /// the motion has been commanded.
    async fn rotate(&mut self, left_degrees: f64, right_degrees: f64, speed: f64) -> Result<()>;

    async fn is_moving(&mut self) -> Result<bool>;

    async fn tacho_counts(&mut self) -> Result<(f64, f64)>;

    async fn stop(&mut self) -> Result<()> {
        self.send(WheelCommand::stopped()).await
    }
}

pub type SharedDriver = Arc<Mutex<Box<dyn WheelDriver>>>;

pub fn shared_driver<D: WheelDriver + 'static>(driver: D) -> SharedDriver {
    Arc::new(Mutex::new(Box::new(driver)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceReading {
    Range(f64),
    /// Nothing echoed back. Never a distance.
    NoReturn,
}

impl DistanceReading {
    /// Map a raw sample to a reading, turning the driver's sentinel into `NoReturn`.
    pub fn from_raw(raw_cm: f64, sentinel: f64) -> Self {
        if raw_cm == sentinel || raw_cm.is_nan() || raw_cm < 0.0 {
            DistanceReading::NoReturn
        } else {
            DistanceReading::Range(raw_cm)
        }
    }

    pub fn range(&self) -> Option<f64> {
        match self {
            DistanceReading::Range(range) => Some(*range),
            DistanceReading::NoReturn => None,
        }
    }
}

#[async_trait]
pub trait DistanceSensor: Send {
    async fn fetch_distance(&mut self) -> Result<DistanceReading>;
}

#[async_trait]
pub trait LightSensor: Send {
    /// Reflected light intensity in `[0, 1]`.
    async fn fetch_reflectance(&mut self) -> Result<f64>;
}

#[async_trait]
pub trait Gyroscope: Send {
    /// Cumulative rotation in degrees since the sensor was reset.
    async fn fetch_angle(&mut self) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Loaded,
}

/// Whether the robot currently carries something.
///
/// Owned by the task layer. The odometer and the navigation loop read it to
/// pick the wheel separation model.
#[derive(Debug, Clone, Default)]
pub struct PayloadHandle {
    loaded: Arc<AtomicBool>,
}

impl PayloadHandle {
    pub fn get(&self) -> Payload {
        if self.loaded.load(Ordering::Acquire) {
            Payload::Loaded
        } else {
            Payload::Empty
        }
    }

    pub fn set(&self, payload: Payload) {
        self.loaded.store(payload == Payload::Loaded, Ordering::Release);
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct LineSensorOffset {
    /// Distance left of the turning center, cm.
    pub left: f64,
    /// Distance behind the turning center, cm.
    pub back: f64,
}

impl Default for LineSensorOffset {
    fn default() -> Self {
        Self {
            left: 5.5,
            back: 7.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BodyConfig {
    /// cm
    pub wheel_radius: f64,
    /// Wheel separation of the idealised model when empty, cm.
    pub track_empty: f64,
    /// Carrying a load shifts the pivot, so the model gets wider.
    pub track_loaded: f64,
    pub line_sensor_offset: LineSensorOffset,
    /// Angle between the bisector of the two wall edges and north, degrees.
    pub ultrasonic_north_offset: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 2.05,
            track_empty: 10.35,
            track_loaded: 10.6,
            line_sensor_offset: LineSensorOffset::default(),
            ultrasonic_north_offset: 135.0,
        }
    }
}

impl BodyConfig {
    pub fn track(&self, payload: Payload) -> f64 {
        match payload {
            Payload::Empty => self.track_empty,
            Payload::Loaded => self.track_loaded,
        }
    }
}

/// Degrees of wheel rotation needed to roll `distance` cm.
pub fn convert_distance(distance: f64, wheel_radius: f64) -> f64 {
    (180.0 * distance) / (PI * wheel_radius)
}

/// Degrees of wheel rotation, per wheel, to spin the robot by `angle` degrees.
pub fn convert_angle(angle: f64, wheel_radius: f64, track: f64) -> f64 {
    convert_distance(PI * track * angle / 360.0, wheel_radius)
}

/// Arc length in cm rolled by a wheel turning `degrees`.
pub fn wheel_arc(degrees: f64, wheel_radius: f64) -> f64 {
    degrees.to_radians() * wheel_radius
}
