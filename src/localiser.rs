//! Absolute heading calibration from two ultrasonic wall edges.
//!
//! The robot spins one way until a wall comes into range, then the other
//! way until the other wall edge shows up. The bisector of the two edge
//! headings sits at a fixed angle from north, which gives the heading offset.
//! A final look straight ahead picks between the two candidate norths.

use crate::{
    correction::CorrectionFlags,
    driver::{DistanceReading, DistanceSensor},
    error::RobotError,
    navigation::Navigation,
    pose::{min_angle, normalize_degrees, PoseHandle},
    sampler::SampleWindow,
    wheel_command::WheelCommand,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LocaliserConfig {
    pub period_ms: u64,
    /// Anything closer than this is a wall, cm.
    pub detection_distance: f64,
    pub rotate_speed: f64,
    pub window: usize,
    /// Open readings needed before an edge may be reported.
    pub clear_cycles: u32,
    /// Wall readings in a row needed to accept an edge.
    pub confirm_cycles: u32,
    /// Extra turn after leaving a wall, degrees.
    pub overshoot: f64,
}

impl Default for LocaliserConfig {
    fn default() -> Self {
        Self {
            period_ms: 15,
            detection_distance: 30.0,
            rotate_speed: 80.0,
            window: 5,
            clear_cycles: 20,
            confirm_cycles: 3,
            overshoot: 45.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorSignal {
    Nothing,
    /// Enough open readings seen. `saw_wall` tells whether it started looking at one.
    Cleared { saw_wall: bool },
    /// Confirmed falling edge at this heading.
    Edge(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Clearing { open: u32, saw_wall: bool },
    Armed { run: u32, start: f64 },
    Done,
}

/// Falling edge detector with outlier rejection.
///
/// Feed it one wall/no-wall decision per poll together with the heading at
/// that poll. It reports at most one edge.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    phase: Phase,
    clear_cycles: u32,
    confirm_cycles: u32,
}

impl EdgeDetector {
    pub fn new(clear_cycles: u32, confirm_cycles: u32) -> Self {
        Self {
            phase: Phase::Clearing {
                open: 0,
                saw_wall: false,
            },
            clear_cycles: clear_cycles.max(1),
            confirm_cycles: confirm_cycles.max(1),
        }
    }

    pub fn push(&mut self, wall: bool, heading: f64) -> DetectorSignal {
        match self.phase {
            Phase::Clearing { open, saw_wall } => {
                if wall {
                    self.phase = Phase::Clearing {
                        open: 0,
                        saw_wall: true,
                    };
                    return DetectorSignal::Nothing;
                }
                let open = open + 1;
                if open >= self.clear_cycles {
                    self.phase = Phase::Armed {
                        run: 0,
                        start: heading,
                    };
                    DetectorSignal::Cleared { saw_wall }
                } else {
                    self.phase = Phase::Clearing { open, saw_wall };
                    DetectorSignal::Nothing
                }
            }
            Phase::Armed { run, start } => {
                if !wall {
                    self.phase = Phase::Armed { run: 0, start };
                    return DetectorSignal::Nothing;
                }
                let start = if run == 0 { heading } else { start };
                let run = run + 1;
                if run >= self.confirm_cycles {
                    self.phase = Phase::Done;
                    DetectorSignal::Edge(start)
                } else {
                    self.phase = Phase::Armed { run, start };
                    DetectorSignal::Nothing
                }
            }
            Phase::Done => DetectorSignal::Nothing,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }
}

/// Heading of north in the frame the two edges were measured in.
///
/// When the plain average lands more than 90° from `theta1` it is the bisector
/// of the wrong arc, so it is flipped before `offset` is applied.
pub fn localize_north(theta1: f64, theta2: f64, offset: f64) -> f64 {
    let mut average = (theta1 + theta2) / 2.0;
    if min_angle(average, theta1) > 90.0 {
        average = normalize_degrees(average + 180.0);
    }
    normalize_degrees(average + offset)
}

pub struct UltrasonicLocaliser {
    sensor: Box<dyn DistanceSensor>,
    nav: Navigation,
    pose: PoseHandle,
    flags: CorrectionFlags,
    north_offset: f64,
    config: LocaliserConfig,
}

impl UltrasonicLocaliser {
    pub fn new(
        sensor: Box<dyn DistanceSensor>,
        nav: Navigation,
        pose: PoseHandle,
        flags: CorrectionFlags,
        north_offset: f64,
        config: LocaliserConfig,
    ) -> Self {
        Self {
            sensor,
            nav,
            pose,
            flags,
            north_offset,
            config,
        }
    }

    /// Calibrate the heading. Only returns once both edges were found.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.flags.set_enabled(false);
        self.flags.stop_gyro_assist();

        let theta1 = self.find_edge(false).await?;
        let theta2 = self.find_edge(true).await?;
        let north = localize_north(theta1, theta2, self.north_offset);
        let corrected = self.pose.update(|pose| pose.theta -= north);
        info!(theta1, theta2, north, pose = %corrected, "heading localised");

        self.nav.turn_to(0.0, None).await?;
        if self.wall_ahead().await? {
            info!("facing a wall at north, flipping heading");
            self.pose.update(|pose| pose.theta += 180.0);
        }
        self.nav.turn_to(0.0, None).await?;
        info!(pose = %self.pose.get(), "calibration done");
        Ok(())
    }

    /// [`UltrasonicLocaliser::run`] with an upper bound on how long it may take.
    pub async fn run_with_timeout(&mut self, limit: Duration) -> anyhow::Result<()> {
        match timeout(limit, self.run()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?limit, "calibration timed out");
                self.nav.set_speeds(0.0, 0.0).await?;
                Err(RobotError::CalibrationTimedOut(limit).into())
            }
        }
    }

    async fn spin(&self, clockwise: bool) -> anyhow::Result<()> {
        let speed = if clockwise {
            self.config.rotate_speed
        } else {
            -self.config.rotate_speed
        };
        let command = WheelCommand::spin(speed);
        self.nav.set_speeds(command.left(), command.right()).await
    }

    /// One poll through `window`. A missing echo is never a wall.
    async fn sees_wall(&mut self, window: &mut SampleWindow) -> anyhow::Result<bool> {
        Ok(match self.sensor.fetch_distance().await? {
            DistanceReading::Range(distance) => {
                window.add(distance);
                window
                    .average()
                    .is_some_and(|average| average < self.config.detection_distance)
            }
            DistanceReading::NoReturn => false,
        })
    }

    async fn find_edge(&mut self, clockwise: bool) -> anyhow::Result<f64> {
        let direction = if clockwise { 1.0 } else { -1.0 };
        let mut window = SampleWindow::new(self.config.window);
        let config = &self.config;
        let mut detector = EdgeDetector::new(config.clear_cycles, config.confirm_cycles);
        let mut ticker = interval(Duration::from_millis(self.config.period_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(clockwise, "looking for wall edge");
        self.spin(clockwise).await?;
        loop {
            ticker.tick().await;
            let wall = self.sees_wall(&mut window).await?;
            let heading = self.pose.get().theta;
            match detector.push(wall, heading) {
                DetectorSignal::Cleared { saw_wall: true } => {
                    debug!(heading, "left the wall, overshooting");
                    let past_edge = heading + direction * self.config.overshoot;
                    self.nav
                        .turn_to(past_edge, Some(self.config.rotate_speed))
                        .await?;
                    window.clear();
                    self.spin(clockwise).await?;
                }
                DetectorSignal::Edge(edge) => {
                    self.nav.set_speeds(0.0, 0.0).await?;
                    info!(edge, clockwise, "wall edge found");
                    return Ok(edge);
                }
                DetectorSignal::Cleared { saw_wall: false } | DetectorSignal::Nothing => (),
            }
        }
    }

    async fn wall_ahead(&mut self) -> anyhow::Result<bool> {
        let mut window = SampleWindow::new(self.config.window);
        let mut wall = false;
        for _ in 0..self.config.window.max(1) {
            wall = self.sees_wall(&mut window).await?;
            tokio::time::sleep(Duration::from_millis(self.config.period_ms)).await;
        }
        Ok(wall)
    }
}
