//! Uniform periodic loop used by the odometer, the drift corrector and the
//! navigation state machine.

use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info};

#[async_trait]
pub trait PeriodicTask: Send + 'static {
    fn name(&self) -> &'static str;

    fn period(&self) -> Duration;

    async fn tick(&mut self) -> anyhow::Result<()>;
}

/// Stop flag and join handle for a spawned loop.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ask the loop to exit after its current tick. Terminal.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.handle.is_finished()
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub async fn join(self) {
        self.stop();
        if let Err(err) = self.handle.await {
            error!("{} loop panicked {:?}", self.name, err);
        }
    }
}

pub fn spawn_periodic<T: PeriodicTask>(task: T) -> TaskHandle {
    spawn_periodic_with_flag(task, Arc::new(AtomicBool::new(true)))
}

/// Same as [`spawn_periodic`] but stopped through a flag the caller already holds.
pub fn spawn_periodic_with_flag<T: PeriodicTask>(
    mut task: T,
    running: Arc<AtomicBool>,
) -> TaskHandle {
    let name = task.name();
    let running_handle = running.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = interval(task.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("{} loop started with period {:?}", name, task.period());
        while running_handle.load(Ordering::Acquire) {
            ticker.tick().await;
            if !running_handle.load(Ordering::Acquire) {
                break;
            }
            if let Err(err) = task.tick().await {
                error!("{} loop failed with {:?}", name, err);
                running_handle.store(false, Ordering::Release);
                return;
            }
        }
        debug!("{} loop stopped", name);
    });
    TaskHandle {
        name,
        running,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        ticks: Arc<AtomicUsize>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl PeriodicTask for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn period(&self) -> Duration {
            Duration::from_millis(10)
        }

        async fn tick(&mut self) -> anyhow::Result<()> {
            let count = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_after {
                Some(limit) if count >= limit => Err(anyhow::anyhow!("sensor unplugged")),
                _ => Ok(()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_period_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = spawn_periodic(Counter {
            ticks: ticks.clone(),
            fail_after: None,
        });
        tokio::time::sleep(Duration::from_millis(105)).await;
        let seen = ticks.load(Ordering::SeqCst);
        // first tick fires immediately
        assert!((10..=12).contains(&seen), "saw {seen} ticks");
        handle.join().await;
        let after_stop = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(after_stop, ticks.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn error_halts_only_that_loop() {
        let failing_ticks = Arc::new(AtomicUsize::new(0));
        let healthy_ticks = Arc::new(AtomicUsize::new(0));
        let failing = spawn_periodic(Counter {
            ticks: failing_ticks.clone(),
            fail_after: Some(3),
        });
        let healthy = spawn_periodic(Counter {
            ticks: healthy_ticks.clone(),
            fail_after: None,
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(failing_ticks.load(Ordering::SeqCst), 3);
        assert!(!failing.is_running());
        assert!(healthy.is_running());
        assert!(healthy_ticks.load(Ordering::SeqCst) > 15);
        healthy.join().await;
    }
}
