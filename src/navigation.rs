//! Goal driven motion controller.
//!
//! [`Navigation`] is the cloneable handle task logic talks to. The state
//! machine itself runs in [`NavigationLoop`], spawned as a periodic task.
//! ```text
//! INIT -> TURNING -> TRAVELING -> INIT
//!            ^           |
//!            +-----------+  (drifted off heading)
//! ```

use crate::{
    configuration::ArenaConfig,
    correction::CorrectionFlags,
    driver::{convert_angle, BodyConfig, Payload, PayloadHandle, SharedDriver},
    error::RobotError,
    pose::{min_angle, minimum_turn, normalize_degrees, PoseHandle},
    task::{spawn_periodic_with_flag, PeriodicTask, TaskHandle},
    wheel_command::WheelCommand,
};
use async_trait::async_trait;
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    time::{timeout, Instant},
};
use tracing::{debug, info, warn};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NavigationConfig {
    pub period_ms: u64,
    /// Wheel speed while driving, deg/s.
    pub forward_speed: f64,
    /// Wheel speed while turning on the spot, deg/s.
    pub rotate_speed: f64,
    /// Position counts as reached below this distance, cm.
    pub arrival_tolerance: f64,
    /// Turns finish once within this many degrees.
    pub facing_tolerance: f64,
    /// Heading error tolerated while already driving.
    pub route_heading_tolerance: f64,
    /// Distance between heading checks while driving, cm.
    pub recheck_distance: f64,
    /// Start slowing down this close to the goal, cm.
    pub slow_distance: f64,
    pub min_speed: f64,
    /// Pause after a turn before trusting the pose, ms.
    pub settle_ms: u64,
    pub wait_poll_interval_ms: u64,
    /// Enable the drift corrector while driving.
    pub drift_correction: bool,
    /// Straight segments longer than this get gyro assist. Defaults to one grid diagonal.
    pub gyro_assist_distance: Option<f64>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            forward_speed: 270.0,
            rotate_speed: 180.0,
            arrival_tolerance: 0.5,
            facing_tolerance: 0.8,
            route_heading_tolerance: 2.0,
            recheck_distance: 4.0,
            slow_distance: 5.0,
            min_speed: 60.0,
            settle_ms: 50,
            wait_poll_interval_ms: 500,
            drift_correction: true,
            gyro_assist_distance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavigationState {
    Init,
    Turning,
    Traveling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoalKind {
    Position,
    /// Turn on the spot only.
    Heading { speed: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub dest_x: f64,
    pub dest_y: f64,
    pub dest_theta: f64,
    pub kind: GoalKind,
    pub active: bool,
}

#[derive(Debug, Default)]
struct Control {
    goal: Option<Goal>,
    generation: u64,
}

struct Shared {
    control: Mutex<Control>,
    navigating: watch::Sender<bool>,
    state: watch::Sender<NavigationState>,
    running: Arc<AtomicBool>,
}

impl Shared {
    fn control(&self) -> std::sync::MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct Navigation {
    shared: Arc<Shared>,
    pose: PoseHandle,
    driver: SharedDriver,
    flags: CorrectionFlags,
    payload: PayloadHandle,
    body: BodyConfig,
    config: Arc<NavigationConfig>,
    gyro_assist_distance: f64,
}

impl Navigation {
    pub fn new(
        pose: PoseHandle,
        driver: SharedDriver,
        flags: CorrectionFlags,
        payload: PayloadHandle,
        body: BodyConfig,
        config: NavigationConfig,
        arena: &ArenaConfig,
    ) -> Self {
        let (navigating, _) = watch::channel(false);
        let (state, _) = watch::channel(NavigationState::Init);
        let gyro_assist_distance = config
            .gyro_assist_distance
            .unwrap_or(arena.grid_spacing * std::f64::consts::SQRT_2);
        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control::default()),
                navigating,
                state,
                running: Arc::new(AtomicBool::new(true)),
            }),
            pose,
            driver,
            flags,
            payload,
            body,
            config: Arc::new(config),
            gyro_assist_distance,
        }
    }

    /// Start the state machine. Stopped for good by [`Navigation::end`].
    pub fn spawn(&self) -> TaskHandle {
        spawn_periodic_with_flag(
            NavigationLoop {
                nav: self.clone(),
                generation: 0,
                turn: TurnProgress::Idle,
                last_check: na::Point2::origin(),
            },
            self.shared.running.clone(),
        )
    }

    fn set_goal(&self, kind: GoalKind, dest_x: f64, dest_y: f64, dest_theta: f64) {
        let mut control = self.shared.control();
        control.generation += 1;
        control.goal = Some(Goal {
            dest_x,
            dest_y,
            dest_theta,
            kind,
            active: true,
        });
        self.shared.state.send_replace(NavigationState::Init);
        self.shared.navigating.send_replace(true);
    }

    /// Head for `(x, y)`. Returns immediately; see [`Navigation::wait_until_done`].
    ///
    /// Gyro assist from a previous leg is dropped; the loop restarts it if
    /// this leg is long enough.
    pub fn travel_to(&self, x: f64, y: f64) -> Result<(), RobotError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(RobotError::InvalidGoal(format!("position ({x}, {y})")));
        }
        self.flags.stop_gyro_assist();
        let theta = self.angle_to(x, y);
        info!(x, y, theta, "travel goal");
        self.set_goal(GoalKind::Position, x, y, theta);
        Ok(())
    }

    /// Turn on the spot to an absolute heading the shorter way round and wait for it.
    pub async fn turn_to(&self, theta: f64, speed: Option<f64>) -> Result<(), RobotError> {
        let speed = speed.unwrap_or(self.config.rotate_speed);
        if !theta.is_finite() {
            return Err(RobotError::InvalidGoal(format!("heading {theta}")));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(RobotError::InvalidGoal(format!("rotate speed {speed}")));
        }
        let theta = normalize_degrees(theta);
        let pose = self.pose.get();
        info!(theta, speed, "turn goal");
        self.set_goal(GoalKind::Heading { speed }, pose.x, pose.y, theta);
        self.wait_until_done().await
    }

    /// Direct wheel override for manual manoeuvres.
    pub async fn set_speeds(&self, left: f64, right: f64) -> anyhow::Result<()> {
        self.driver
            .lock()
            .await
            .send(WheelCommand::new(left, right))
            .await
    }

    pub fn is_navigating(&self) -> bool {
        *self.shared.navigating.borrow()
    }

    pub fn state(&self) -> NavigationState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NavigationState> {
        self.shared.state.subscribe()
    }

    pub fn goal(&self) -> Option<Goal> {
        self.shared.control().goal
    }

    /// Suspend until the current goal is done.
    ///
    /// Wakes on completion and re-checks at least every `wait_poll_interval_ms`.
    pub async fn wait_until_done(&self) -> Result<(), RobotError> {
        let mut navigating = self.shared.navigating.subscribe();
        let poll = Duration::from_millis(self.config.wait_poll_interval_ms.max(1));
        loop {
            if !*navigating.borrow_and_update() {
                return Ok(());
            }
            if !self.shared.running.load(Ordering::Acquire) {
                return Err(RobotError::NavigationStopped);
            }
            // a timed out wait just loops again
            let _ = timeout(poll, navigating.changed()).await;
        }
    }

    pub fn angle_to(&self, x: f64, y: f64) -> f64 {
        self.pose.get().bearing_to(x, y)
    }

    /// Distance left to the current position goal, zero without one.
    pub fn get_dist(&self) -> f64 {
        match self.goal() {
            Some(goal) if goal.active && goal.kind == GoalKind::Position => {
                self.pose.get().distance_to(goal.dest_x, goal.dest_y)
            }
            _ => 0.0,
        }
    }

    /// Stop the controller permanently.
    pub async fn end(&self) -> anyhow::Result<()> {
        info!("navigation ended");
        self.shared.running.store(false, Ordering::Release);
        self.shared.navigating.send_modify(|_| ());
        self.flags.stop_gyro_assist();
        self.driver.lock().await.stop().await
    }

    /// Drop the current goal, stop the wheels and release any waiters.
    pub async fn abandon(&self) -> anyhow::Result<()> {
        {
            let mut control = self.shared.control();
            control.generation += 1;
            control.goal = None;
            self.shared.state.send_replace(NavigationState::Init);
            self.shared.navigating.send_replace(false);
        }
        warn!("goal abandoned");
        self.flags.stop_gyro_assist();
        self.driver.lock().await.stop().await
    }

    pub fn set_payload(&self, payload: Payload) {
        info!(?payload, "payload changed");
        self.payload.set(payload);
    }

    /// False once the goal being worked on was replaced or the loop was ended.
    fn is_current(&self, generation: u64) -> bool {
        self.shared.running.load(Ordering::Acquire)
            && self.shared.control().generation == generation
    }

    fn snapshot(&self) -> (Option<Goal>, u64) {
        let control = self.shared.control();
        (control.goal, control.generation)
    }

    /// Move to `state` unless a newer goal has replaced the one being worked on.
    fn transition(&self, generation: u64, state: NavigationState) -> bool {
        let control = self.shared.control();
        if control.generation != generation {
            return false;
        }
        let previous = self.shared.state.send_replace(state);
        if previous != state {
            info!(?previous, ?state, pose = %self.pose.get(), "navigation state");
        }
        true
    }

    async fn finish(&self, generation: u64) -> anyhow::Result<()> {
        self.driver.lock().await.stop().await?;
        self.flags.stop_gyro_assist();
        let mut control = self.shared.control();
        if control.generation != generation {
            return Ok(());
        }
        if let Some(goal) = control.goal.as_mut() {
            goal.active = false;
        }
        let previous = self.shared.state.send_replace(NavigationState::Init);
        self.shared.navigating.send_replace(false);
        info!(?previous, pose = %self.pose.get(), "goal reached");
        Ok(())
    }

    fn turn_speed(&self, goal: &Goal) -> f64 {
        match goal.kind {
            GoalKind::Position => self.config.rotate_speed,
            GoalKind::Heading { speed } => speed,
        }
    }

    fn forward_speed(&self, distance: f64) -> f64 {
        let config = &self.config;
        if distance >= config.slow_distance || config.slow_distance <= 0.0 {
            config.forward_speed
        } else {
            let scale = distance / config.slow_distance;
            config.min_speed + (config.forward_speed - config.min_speed) * scale
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TurnProgress {
    Idle,
    Rotating,
    Settling(Instant),
}

pub struct NavigationLoop {
    nav: Navigation,
    generation: u64,
    turn: TurnProgress,
    last_check: na::Point2<f64>,
}

impl NavigationLoop {
    async fn start(&mut self, goal: Goal) -> anyhow::Result<()> {
        let pose = self.nav.pose.get();
        if goal.kind == GoalKind::Position
            && pose.distance_to(goal.dest_x, goal.dest_y) < self.nav.config.arrival_tolerance
        {
            debug!("already at goal");
            return self.nav.finish(self.generation).await;
        }
        self.nav.transition(self.generation, NavigationState::Turning);
        Ok(())
    }

    async fn turning(&mut self, goal: Goal) -> anyhow::Result<()> {
        let nav = &self.nav;
        nav.flags.set_enabled(false);
        match self.turn {
            TurnProgress::Rotating => {
                if nav.driver.lock().await.is_moving().await? {
                    return Ok(());
                }
                let settle = Duration::from_millis(nav.config.settle_ms);
                self.turn = TurnProgress::Settling(Instant::now() + settle);
                return Ok(());
            }
            TurnProgress::Settling(until) => {
                if Instant::now() < until {
                    return Ok(());
                }
                self.turn = TurnProgress::Idle;
            }
            TurnProgress::Idle => (),
        }

        let pose = nav.pose.get();
        let distance = pose.distance_to(goal.dest_x, goal.dest_y);
        let target = match goal.kind {
            GoalKind::Position if distance < nav.config.arrival_tolerance => {
                return nav.finish(self.generation).await;
            }
            GoalKind::Position => pose.bearing_to(goal.dest_x, goal.dest_y),
            GoalKind::Heading { .. } => goal.dest_theta,
        };

        if pose.is_facing(target, nav.config.facing_tolerance) {
            return match goal.kind {
                GoalKind::Heading { .. } => nav.finish(self.generation).await,
                GoalKind::Position => {
                    if nav.transition(self.generation, NavigationState::Traveling) {
                        self.last_check = pose.position();
                        if distance > nav.gyro_assist_distance {
                            nav.flags.start_gyro_assist();
                        }
                    }
                    Ok(())
                }
            };
        }

        let turn = minimum_turn(pose.theta, target);
        let track = nav.body.track(nav.payload.get());
        let wheel = convert_angle(turn, nav.body.wheel_radius, track);
        debug!(from = pose.theta, to = target, turn, "rotating");
        let mut driver = nav.driver.lock().await;
        if !nav.is_current(self.generation) {
            return Ok(());
        }
        driver.rotate(wheel, -wheel, nav.turn_speed(&goal)).await?;
        self.turn = TurnProgress::Rotating;
        Ok(())
    }

    async fn traveling(&mut self, goal: Goal) -> anyhow::Result<()> {
        let nav = &self.nav;
        let config = &nav.config;
        nav.flags.set_enabled(config.drift_correction);

        let pose = nav.pose.get();
        let distance = pose.distance_to(goal.dest_x, goal.dest_y);
        if distance < config.arrival_tolerance {
            return nav.finish(self.generation).await;
        }

        let bearing = pose.bearing_to(goal.dest_x, goal.dest_y);
        let moved = na::distance(&pose.position(), &self.last_check);
        let off_course = if distance > config.recheck_distance && moved > config.recheck_distance
        {
            self.last_check = pose.position();
            !pose.is_facing(bearing, config.route_heading_tolerance)
        } else {
            // drove past the goal
            distance <= config.recheck_distance && min_angle(pose.theta, bearing) > 90.0
        };
        if off_course {
            debug!(heading = pose.theta, bearing, "off course");
            nav.driver.lock().await.stop().await?;
            nav.transition(self.generation, NavigationState::Turning);
            return Ok(());
        }

        let speed = nav.forward_speed(distance);
        let mut driver = nav.driver.lock().await;
        if !nav.is_current(self.generation) {
            return Ok(());
        }
        driver.send(WheelCommand::forward(speed)).await
    }
}

#[async_trait]
impl PeriodicTask for NavigationLoop {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.nav.config.period_ms.max(1))
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let (goal, generation) = self.nav.snapshot();
        if generation != self.generation {
            self.generation = generation;
            if self.turn != TurnProgress::Idle {
                self.turn = TurnProgress::Idle;
                self.nav.driver.lock().await.stop().await?;
            }
        }
        let Some(goal) = goal.filter(|goal| goal.active) else {
            return Ok(());
        };
        match self.nav.state() {
            NavigationState::Init => self.start(goal).await,
            NavigationState::Turning => self.turning(goal).await,
            NavigationState::Traveling => self.traveling(goal).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::{
            shared_driver,
            sim::{SimConfig, SimulatedArena},
            Gyroscope,
        },
        odometer::{Odometer, OdometerConfig},
        pose::Pose,
        task::spawn_periodic,
    };
    use approx::assert_relative_eq;

    struct Rig {
        sim: SimulatedArena,
        pose: PoseHandle,
        flags: CorrectionFlags,
        nav: Navigation,
        tasks: Vec<TaskHandle>,
    }

    impl Rig {
        fn new(start: Pose) -> Self {
            let sim = SimulatedArena::new(SimConfig::default(), start);
            let driver = shared_driver(sim.clone());
            let pose = PoseHandle::new(start);
            let payload = PayloadHandle::default();
            let flags = CorrectionFlags::default();
            let odometer = spawn_periodic(Odometer::new(
                driver.clone(),
                pose.clone(),
                payload.clone(),
                BodyConfig::default(),
                &OdometerConfig::default(),
            ));
            let nav = Navigation::new(
                pose.clone(),
                driver,
                flags.clone(),
                payload,
                BodyConfig::default(),
                NavigationConfig {
                    drift_correction: false,
                    ..Default::default()
                },
                &ArenaConfig::default(),
            );
            let control = nav.spawn();
            Self {
                sim,
                pose,
                flags,
                nav,
                tasks: vec![odometer, control],
            }
        }

        async fn shutdown(self) {
            for task in self.tasks {
                task.join().await;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn diagonal_grid_square_turns_then_travels() {
        let rig = Rig::new(Pose::new(0.0, 0.0, 0.0));
        rig.nav.travel_to(30.48, 30.48).unwrap();
        let mut states = rig.nav.subscribe_state();
        assert!(rig.nav.is_navigating());
        assert_relative_eq!(rig.nav.goal().unwrap().dest_theta, 45.0, epsilon = 1e-9);

        let mut seen = Vec::new();
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            seen.push(state);
            if state == NavigationState::Init {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                NavigationState::Turning,
                NavigationState::Traveling,
                NavigationState::Init
            ]
        );
        rig.nav.wait_until_done().await.unwrap();
        assert!(!rig.nav.is_navigating());

        let pose = rig.pose.get();
        assert!(pose.distance_to(30.48, 30.48) < 0.5, "ended at {pose}");
        assert_relative_eq!(pose.theta, 45.0, epsilon = 0.8);
        assert!(rig.sim.truth().distance_to(30.48, 30.48) < 0.6);
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn travel_to_current_goal_completes_immediately() {
        let rig = Rig::new(Pose::new(15.0, 15.0, 0.0));
        rig.nav.travel_to(15.0, 45.0).unwrap();
        rig.nav.wait_until_done().await.unwrap();
        let arrived = rig.pose.get();

        rig.nav.travel_to(15.0, 45.0).unwrap();
        rig.nav.wait_until_done().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.nav.state(), NavigationState::Init);
        let mut sim = rig.sim.clone();
        assert!(!crate::driver::WheelDriver::is_moving(&mut sim).await.unwrap());
        assert_relative_eq!(rig.pose.get().x, arrived.x, epsilon = 1e-9);
        assert_relative_eq!(rig.pose.get().y, arrived.y, epsilon = 1e-9);
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn turn_to_takes_the_short_way() {
        let rig = Rig::new(Pose::new(50.0, 50.0, 0.0));
        let mut gyro = rig.sim.clone();
        for target in [90.0, 350.0, 170.0, 185.0, 0.0] {
            let before = gyro.fetch_angle().await.unwrap();
            rig.nav.turn_to(target, None).await.unwrap();
            let rotated = gyro.fetch_angle().await.unwrap() - before;
            assert!(rotated.abs() <= 180.0 + 0.8, "turned {rotated} to reach {target}");
            assert!(min_angle(rig.pose.get().theta, target) <= 0.8);
            assert!(min_angle(rig.sim.truth().theta, target) <= 0.8);
        }
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn end_releases_waiters_with_error() {
        let rig = Rig::new(Pose::new(0.0, 0.0, 0.0));
        rig.nav.travel_to(200.0, 0.0).unwrap();
        let waiter = {
            let nav = rig.nav.clone();
            tokio::spawn(async move { nav.wait_until_done().await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        rig.nav.end().await.unwrap();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(RobotError::NavigationStopped)
        ));
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_stops_and_clears_goal() {
        let rig = Rig::new(Pose::new(0.0, 0.0, 90.0));
        rig.nav.travel_to(100.0, 0.0).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.nav.state(), NavigationState::Traveling);
        assert!(rig.nav.get_dist() > 0.0);
        rig.nav.abandon().await.unwrap();
        rig.nav.wait_until_done().await.unwrap();
        assert_eq!(rig.nav.get_dist(), 0.0);
        let stopped_at = rig.sim.truth();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_relative_eq!(rig.sim.truth().x, stopped_at.x, epsilon = 1e-9);
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn new_short_leg_drops_gyro_assist() {
        let rig = Rig::new(Pose::new(0.0, 0.0, 90.0));
        rig.nav.travel_to(200.0, 0.0).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.nav.state(), NavigationState::Traveling);
        assert!(rig.flags.is_gyro_assist_active());

        let here = rig.pose.get();
        rig.nav.travel_to(here.x + 10.0, 0.0).unwrap();
        assert!(!rig.flags.is_gyro_assist_active());
        rig.nav.wait_until_done().await.unwrap();
        assert!(!rig.flags.is_gyro_assist_active());
        assert!(rig.pose.get().distance_to(here.x + 10.0, 0.0) < 0.5);
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn non_finite_goals_are_rejected() {
        let rig = Rig::new(Pose::new(10.0, 10.0, 0.0));
        assert!(matches!(
            rig.nav.travel_to(f64::NAN, 0.0),
            Err(RobotError::InvalidGoal(_))
        ));
        assert!(matches!(
            rig.nav.travel_to(0.0, f64::INFINITY),
            Err(RobotError::InvalidGoal(_))
        ));
        assert!(!rig.nav.is_navigating());
        assert!(rig.nav.goal().is_none());
        assert!(matches!(
            rig.nav.turn_to(f64::NAN, None).await,
            Err(RobotError::InvalidGoal(_))
        ));
        assert!(matches!(
            rig.nav.turn_to(90.0, Some(f64::INFINITY)).await,
            Err(RobotError::InvalidGoal(_))
        ));
        assert!(!rig.nav.is_navigating());
        assert_eq!(rig.pose.get(), Pose::new(10.0, 10.0, 0.0));
        rig.shutdown().await;
    }

    #[tokio::test]
    async fn angle_to_and_dist_follow_pose() {
        let rig = Rig::new(Pose::new(10.0, 10.0, 0.0));
        assert_relative_eq!(rig.nav.angle_to(10.0, 0.0), 180.0);
        assert_relative_eq!(rig.nav.angle_to(20.0, 10.0), 90.0);
        assert_eq!(rig.nav.get_dist(), 0.0);
        rig.shutdown().await;
    }

    #[test]
    fn slows_down_near_goal() {
        let nav = Navigation::new(
            PoseHandle::default(),
            shared_driver(SimulatedArena::new(SimConfig::default(), Pose::default())),
            CorrectionFlags::default(),
            PayloadHandle::default(),
            BodyConfig::default(),
            NavigationConfig::default(),
            &ArenaConfig::default(),
        );
        assert_relative_eq!(nav.forward_speed(50.0), 270.0);
        assert_relative_eq!(nav.forward_speed(2.5), 165.0);
        assert!(nav.forward_speed(0.1) >= 60.0);
    }
}
