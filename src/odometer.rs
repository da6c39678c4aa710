//! Dead reckoning from wheel tacho counts.

use crate::{
    driver::{wheel_arc, BodyConfig, PayloadHandle, SharedDriver},
    pose::PoseHandle,
    task::PeriodicTask,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OdometerConfig {
    pub period_ms: u64,
}

impl Default for OdometerConfig {
    fn default() -> Self {
        Self { period_ms: 10 }
    }
}

/// Single integration writer of the pose.
pub struct Odometer {
    driver: SharedDriver,
    pose: PoseHandle,
    payload: PayloadHandle,
    body: BodyConfig,
    period: Duration,
    last_counts: Option<(f64, f64)>,
}

impl Odometer {
    pub fn new(
        driver: SharedDriver,
        pose: PoseHandle,
        payload: PayloadHandle,
        body: BodyConfig,
        config: &OdometerConfig,
    ) -> Self {
        Self {
            driver,
            pose,
            payload,
            body,
            period: Duration::from_millis(config.period_ms.max(1)),
            last_counts: None,
        }
    }

    /// Fold one pair of wheel deltas (degrees) into the pose.
    fn integrate(&self, left_degrees: f64, right_degrees: f64) {
        let left = wheel_arc(left_degrees, self.body.wheel_radius);
        let right = wheel_arc(right_degrees, self.body.wheel_radius);
        let track = self.body.track(self.payload.get());
        let delta_theta = ((left - right) / track).to_degrees();
        let distance = (left + right) / 2.0;
        if delta_theta == 0.0 && distance == 0.0 {
            return;
        }
        self.pose.update(|pose| {
            let heading = (pose.theta + delta_theta / 2.0).to_radians();
            pose.x += distance * heading.sin();
            pose.y += distance * heading.cos();
            pose.theta += delta_theta;
        });
    }
}

#[async_trait]
impl PeriodicTask for Odometer {
    fn name(&self) -> &'static str {
        "odometer"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let counts = self.driver.lock().await.tacho_counts().await?;
        if let Some((last_left, last_right)) = self.last_counts {
            self.integrate(counts.0 - last_left, counts.1 - last_right);
            trace!(pose = %self.pose.get(), "odometer step");
        }
        self.last_counts = Some(counts);
        Ok(())
    }
}
