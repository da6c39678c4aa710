//! Robot pose and the shared cell every loop reads it through.
//!
//! Headings are in degrees, measured clockwise from the arena's +y axis
//! ("north"), and always kept in `[0, 360)`. Moving a distance `d` along
//! heading `t` changes the position by `d * (sin t, cos t)`.

use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::warn;

/// Wrap any angle in degrees into `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Unsigned smallest angle between two headings, in `[0, 180]`.
pub fn min_angle(a: f64, b: f64) -> f64 {
    let ang = normalize_degrees(a - b);
    if ang > 180.0 {
        360.0 - ang
    } else {
        ang
    }
}

/// Signed rotation that takes `from` onto `to` along the shorter way round.
///
/// Positive is clockwise. The magnitude never exceeds 180.
pub fn minimum_turn(from: f64, to: f64) -> f64 {
    let ang = normalize_degrees(to - from);
    if ang < 180.0 {
        ang
    } else {
        ang - 360.0
    }
}

/// Heading from `(x, y)` towards `(target_x, target_y)`.
pub fn bearing(x: f64, y: f64, target_x: f64, target_y: f64) -> f64 {
    let dx = target_x - x;
    let dy = target_y - y;
    normalize_degrees(dx.atan2(dy).to_degrees())
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "PoseFields")]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

/// Wire form of [`Pose`], normalized on the way in.
#[derive(Deserialize)]
struct PoseFields {
    x: f64,
    y: f64,
    theta: f64,
}

impl From<PoseFields> for Pose {
    fn from(fields: PoseFields) -> Self {
        Pose::new(fields.x, fields.y, fields.theta)
    }
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_degrees(theta),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    pub fn position(&self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }

    /// Unit vector pointing along the current heading.
    pub fn heading_vector(&self) -> na::Vector2<f64> {
        let theta = self.theta.to_radians();
        na::Vector2::new(theta.sin(), theta.cos())
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        na::distance(&self.position(), &na::Point2::new(x, y))
    }

    pub fn bearing_to(&self, x: f64, y: f64) -> f64 {
        bearing(self.x, self.y, x, y)
    }

    /// Whether the heading is within `tolerance` degrees of `heading`.
    pub fn is_facing(&self, heading: f64, tolerance: f64) -> bool {
        min_angle(self.theta, heading) < tolerance
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:.2}, {:.2}] -> {:.2}", self.x, self.y, self.theta)
    }
}

/// Partial overwrite of a pose. Fields left as `None` keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub theta: Option<f64>,
}

impl PoseUpdate {
    pub fn xyt(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            theta: Some(theta),
        }
    }

    pub fn theta(theta: f64) -> Self {
        Self {
            theta: Some(theta),
            ..Default::default()
        }
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            theta: None,
        }
    }
}

/// Cloneable handle to the one pose estimate.
///
/// Every write runs under the write lock as a single read-modify-write, so
/// a reader never sees `x` from one update and `theta` from another.
#[derive(Debug, Clone, Default)]
pub struct PoseHandle {
    inner: Arc<RwLock<Pose>>,
}

impl PoseHandle {
    pub fn new(initial: Pose) -> Self {
        let initial = Pose::new(initial.x, initial.y, initial.theta);
        let initial = if initial.is_finite() {
            initial
        } else {
            warn!(pose = %initial, "non-finite initial pose, starting at the origin");
            Pose::default()
        };
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> Pose {
        // a writer can't leave a half written Pose behind, so poison is harmless
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, update: PoseUpdate) -> Pose {
        self.update(|pose| {
            if let Some(x) = update.x {
                pose.x = x;
            }
            if let Some(y) = update.y {
                pose.y = y;
            }
            if let Some(theta) = update.theta {
                pose.theta = theta;
            }
        })
    }

    pub fn set_xyt(&self, x: f64, y: f64, theta: f64) -> Pose {
        self.set(PoseUpdate::xyt(x, y, theta))
    }

    pub fn set_theta(&self, theta: f64) -> Pose {
        self.set(PoseUpdate::theta(theta))
    }

    /// Apply `change` atomically and return the resulting pose.
    ///
    /// A change that leaves any field NaN or infinite is dropped and the
    /// previous pose is kept.
    pub fn update<F: FnOnce(&mut Pose)>(&self, change: F) -> Pose {
        let mut pose = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = *pose;
        change(&mut next);
        next.theta = normalize_degrees(next.theta);
        if next.is_finite() {
            *pose = next;
        } else {
            let kept = *pose;
            warn!(rejected = %next, %kept, "ignoring non-finite pose write");
        }
        *pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_wraps_both_directions() {
        assert_relative_eq!(normalize_degrees(370.0), 10.0);
        assert_relative_eq!(normalize_degrees(-90.0), 270.0);
        assert_relative_eq!(normalize_degrees(720.0), 0.0);
        assert!(normalize_degrees(-1e-14) < 360.0);
    }

    #[test]
    fn min_angle_wraps() {
        assert_relative_eq!(min_angle(350.0, 10.0), 20.0);
        assert_relative_eq!(min_angle(10.0, 350.0), 20.0);
        assert_relative_eq!(min_angle(0.0, 180.0), 180.0);
    }

    #[test]
    fn minimum_turn_never_exceeds_half_circle() {
        let mut from = 0.0;
        while from < 360.0 {
            let mut to = 0.0;
            while to < 360.0 {
                let turn = minimum_turn(from, to);
                assert!(turn.abs() <= 180.0, "{from} -> {to} gave {turn}");
                assert!(min_angle(from + turn, to) < 1e-9);
                to += 7.5;
            }
            from += 11.0;
        }
    }

    #[test]
    fn minimum_turn_picks_counter_clockwise_when_shorter() {
        assert_relative_eq!(minimum_turn(10.0, 300.0), -70.0);
        assert_relative_eq!(minimum_turn(300.0, 10.0), 70.0);
    }

    #[test]
    fn bearing_follows_clockwise_from_north() {
        assert_relative_eq!(bearing(0.0, 0.0, 0.0, 10.0), 0.0);
        assert_relative_eq!(bearing(0.0, 0.0, 10.0, 0.0), 90.0);
        assert_relative_eq!(bearing(0.0, 0.0, 0.0, -10.0), 180.0);
        assert_relative_eq!(bearing(0.0, 0.0, -10.0, 0.0), 270.0);
        assert_relative_eq!(bearing(0.0, 0.0, 30.48, 30.48), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn handle_normalizes_every_write() {
        let handle = PoseHandle::default();
        handle.set_theta(-45.0);
        assert_relative_eq!(handle.get().theta, 315.0);
        handle.update(|pose| pose.theta += 100.0);
        assert_relative_eq!(handle.get().theta, 55.0);
    }

    #[test]
    fn handle_normalizes_initial_heading() {
        let handle = PoseHandle::new(Pose {
            x: 1.0,
            y: 2.0,
            theta: 400.0,
        });
        assert_relative_eq!(handle.get().theta, 40.0);
        let handle = PoseHandle::new(Pose {
            x: 1.0,
            y: 2.0,
            theta: -90.0,
        });
        assert_relative_eq!(handle.get().theta, 270.0);
    }

    #[test]
    fn non_finite_writes_keep_previous_pose() {
        let handle = PoseHandle::new(Pose::new(10.0, 20.0, 30.0));
        assert_eq!(handle.set_theta(f64::NAN), Pose::new(10.0, 20.0, 30.0));
        handle.set_xyt(f64::INFINITY, 5.0, 5.0);
        handle.update(|pose| pose.y = f64::NEG_INFINITY);
        assert_eq!(handle.get(), Pose::new(10.0, 20.0, 30.0));
        handle.set_theta(45.0);
        assert_relative_eq!(handle.get().theta, 45.0);
    }

    #[test]
    fn deserialized_pose_is_normalized() {
        let json = r#"{"x": 1.0, "y": 2.0, "theta": -90.0}"#;
        let pose: Pose = serde_json::from_str(json).unwrap();
        assert_eq!(pose, Pose::new(1.0, 2.0, 270.0));
        let json = r#"{"x": 0.0, "y": 0.0, "theta": 720.5}"#;
        let pose: Pose = serde_json::from_str(json).unwrap();
        assert_relative_eq!(pose.theta, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let handle = PoseHandle::new(Pose::new(1.0, 2.0, 3.0));
        handle.set(PoseUpdate {
            y: Some(20.0),
            ..Default::default()
        });
        assert_eq!(handle.get(), Pose::new(1.0, 20.0, 3.0));
    }

    #[test]
    fn facing_uses_wrapped_difference() {
        let pose = Pose::new(0.0, 0.0, 359.6);
        assert!(pose.is_facing(0.2, 0.8));
        assert!(!pose.is_facing(1.0, 0.8));
    }

    #[test]
    fn concurrent_writers_never_tear() {
        let handle = PoseHandle::default();
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let value = i as f64;
                        handle.set_xyt(value, value, value);
                    }
                })
            })
            .collect();
        for _ in 0..1000 {
            let pose = handle.get();
            assert_eq!(pose.x, pose.y);
            assert_eq!(pose.y, pose.theta);
        }
        for writer in writers {
            writer.join().unwrap();
        }
    }
}
