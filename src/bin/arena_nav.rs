use anyhow::{Context, Result};
use arena_nav::{
    configuration::AppConfig, driver::sim::SimulatedArena, logging, pose::Pose,
    robot::RobotBuilder,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::{path::PathBuf, time::Duration};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    author = "David M. Weis <dweis7@gmail.com>",
    about = "Calibrate and drive a simulated arena robot"
)]
struct Args {
    /// path to config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Waypoints as "x,y;x,y" in cm
    #[arg(long, default_value = "30.48,30.48;91.44,30.48;91.44,91.44")]
    route: String,

    /// Trust the configured start heading instead of calibrating
    #[arg(long)]
    skip_calibration: bool,

    /// Give up calibrating after this many seconds
    #[arg(long)]
    calibration_timeout: Option<u64>,

    /// Print a JSON pose sample after every waypoint
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct PoseSample {
    timestamp: DateTime<Utc>,
    waypoint: usize,
    estimate: Pose,
    truth: Pose,
}

fn parse_route(route: &str) -> Result<Vec<(f64, f64)>> {
    route
        .split(';')
        .filter(|point| !point.trim().is_empty())
        .map(|point| -> Result<(f64, f64)> {
            let (x, y) = point
                .split_once(',')
                .with_context(|| format!("waypoint {point:?} is not x,y"))?;
            Ok((x.trim().parse()?, y.trim().parse()?))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbosity);

    let app_config = AppConfig::load_config(&args.config)?;
    let route = parse_route(&args.route)?;

    let start = app_config.simulation.start;
    let sim = SimulatedArena::new(app_config.sim_config(), start);
    // the estimate only knows where it is, not which way it faces
    let initial = if args.skip_calibration {
        start
    } else {
        Pose::new(start.x, start.y, 0.0)
    };
    let mut robot = RobotBuilder::new(app_config)
        .with_initial_pose(initial)
        .with_simulated_arena(&sim)
        .build()?;

    if !args.skip_calibration {
        match args.calibration_timeout {
            Some(seconds) => {
                robot
                    .calibrate_with_timeout(Duration::from_secs(seconds))
                    .await?
            }
            None => robot.calibrate().await?,
        }
    }

    for (waypoint, (x, y)) in route.into_iter().enumerate() {
        robot.navigation().travel_to(x, y)?;
        robot.navigation().wait_until_done().await?;
        let sample = PoseSample {
            timestamp: Utc::now(),
            waypoint,
            estimate: robot.pose().get(),
            truth: sim.truth(),
        };
        if args.json {
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            info!(
                waypoint,
                estimate = %sample.estimate,
                truth = %sample.truth,
                "waypoint reached"
            );
        }
    }

    robot.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_route() {
        assert_eq!(
            parse_route("30.48,30.48; 0, 61").unwrap(),
            vec![(30.48, 30.48), (0.0, 61.0)]
        );
        assert!(parse_route("30.48").is_err());
    }
}
