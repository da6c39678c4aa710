//! Wires the pose store, the drift corrector, the motion controller and the
//! heading calibrator together in a fixed order.

use crate::{
    configuration::AppConfig,
    correction::{CorrectionFlags, DriftCorrector},
    driver::{
        shared_driver, sim::SimulatedArena, DistanceSensor, Gyroscope, LightSensor,
        PayloadHandle, SharedDriver, WheelDriver,
    },
    error::RobotError,
    localiser::UltrasonicLocaliser,
    navigation::Navigation,
    odometer::Odometer,
    pose::{Pose, PoseHandle},
    task::{spawn_periodic, TaskHandle},
};
use futures::future::join_all;
use std::time::Duration;
use tracing::info;

#[derive(Default)]
pub struct RobotBuilder {
    config: AppConfig,
    initial_pose: Pose,
    driver: Option<SharedDriver>,
    distance: Option<Box<dyn DistanceSensor>>,
    light: Option<Box<dyn LightSensor>>,
    gyro: Option<Box<dyn Gyroscope>>,
}

impl RobotBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_initial_pose(mut self, pose: Pose) -> Self {
        self.initial_pose = pose;
        self
    }

    pub fn with_driver<D: WheelDriver + 'static>(mut self, driver: D) -> Self {
        self.driver = Some(shared_driver(driver));
        self
    }

    pub fn with_distance_sensor<S: DistanceSensor + 'static>(mut self, sensor: S) -> Self {
        self.distance = Some(Box::new(sensor));
        self
    }

    pub fn with_light_sensor<S: LightSensor + 'static>(mut self, sensor: S) -> Self {
        self.light = Some(Box::new(sensor));
        self
    }

    pub fn with_gyroscope<S: Gyroscope + 'static>(mut self, sensor: S) -> Self {
        self.gyro = Some(Box::new(sensor));
        self
    }

    /// Use one simulated arena for every actuator and sensor.
    pub fn with_simulated_arena(self, sim: &SimulatedArena) -> Self {
        self.with_driver(sim.clone())
            .with_distance_sensor(sim.clone())
            .with_light_sensor(sim.clone())
            .with_gyroscope(sim.clone())
    }

    /// Create the pose store, then start every loop that reads it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Robot, RobotError> {
        let driver = self.driver.ok_or(RobotError::NotInitialized("wheel driver"))?;
        let distance = self
            .distance
            .ok_or(RobotError::NotInitialized("distance sensor"))?;
        let light = self.light.ok_or(RobotError::NotInitialized("light sensor"))?;
        let gyro = self.gyro.ok_or(RobotError::NotInitialized("gyroscope"))?;
        let config = self.config;

        let pose = PoseHandle::new(self.initial_pose);
        let payload = PayloadHandle::default();
        let flags = CorrectionFlags::default();

        let odometer = spawn_periodic(Odometer::new(
            driver.clone(),
            pose.clone(),
            payload.clone(),
            config.body.clone(),
            &config.odometer,
        ));
        let corrector = spawn_periodic(DriftCorrector::new(
            pose.clone(),
            flags.clone(),
            light,
            gyro,
            config.body.line_sensor_offset,
            &config.arena,
            config.correction.clone(),
        ));
        let navigation = Navigation::new(
            pose.clone(),
            driver,
            flags.clone(),
            payload.clone(),
            config.body.clone(),
            config.navigation.clone(),
            &config.arena,
        );
        let control = navigation.spawn();
        let localiser = UltrasonicLocaliser::new(
            distance,
            navigation.clone(),
            pose.clone(),
            flags.clone(),
            config.body.ultrasonic_north_offset,
            config.localiser.clone(),
        );
        info!(pose = %pose.get(), "robot started");

        Ok(Robot {
            pose,
            payload,
            flags,
            navigation,
            localiser,
            tasks: vec![odometer, corrector, control],
        })
    }
}

pub struct Robot {
    pose: PoseHandle,
    payload: PayloadHandle,
    flags: CorrectionFlags,
    navigation: Navigation,
    localiser: UltrasonicLocaliser,
    tasks: Vec<TaskHandle>,
}

impl Robot {
    pub fn pose(&self) -> &PoseHandle {
        &self.pose
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn correction(&self) -> &CorrectionFlags {
        &self.flags
    }

    pub fn payload(&self) -> &PayloadHandle {
        &self.payload
    }

    pub async fn calibrate(&mut self) -> anyhow::Result<()> {
        self.localiser.run().await
    }

    pub async fn calibrate_with_timeout(&mut self, limit: Duration) -> anyhow::Result<()> {
        self.localiser.run_with_timeout(limit).await
    }

    /// Names of the background loops still running.
    pub fn running_tasks(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|task| task.is_running())
            .map(TaskHandle::name)
            .collect()
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.navigation.end().await?;
        join_all(self.tasks.into_iter().map(TaskHandle::join)).await;
        info!(pose = %self.pose.get(), "robot stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::sim::SimConfig;

    #[tokio::test]
    async fn missing_parts_fail_fast() {
        let sim = SimulatedArena::new(SimConfig::default(), Pose::default());
        let result = RobotBuilder::new(AppConfig::default())
            .with_driver(sim.clone())
            .with_distance_sensor(sim)
            .build();
        assert!(matches!(
            result,
            Err(RobotError::NotInitialized("light sensor"))
        ));
        assert!(matches!(
            RobotBuilder::default().build(),
            Err(RobotError::NotInitialized("wheel driver"))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn starts_and_stops_every_loop() {
        let sim = SimulatedArena::new(SimConfig::default(), Pose::new(30.0, 30.0, 0.0));
        let robot = RobotBuilder::new(AppConfig::default())
            .with_initial_pose(Pose::new(30.0, 30.0, 0.0))
            .with_simulated_arena(&sim)
            .build()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            robot.running_tasks(),
            vec!["odometer", "drift corrector", "navigation"]
        );
        assert_eq!(robot.pose().get(), Pose::new(30.0, 30.0, 0.0));
        robot.shutdown().await.unwrap();
    }
}
