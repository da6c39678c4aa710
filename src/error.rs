use std::time::Duration;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RobotError {
    #[error("{0} used before it was initialized")]
    NotInitialized(&'static str),
    #[error("heading calibration did not find both wall edges within {0:?}")]
    CalibrationTimedOut(Duration),
    #[error("navigation loop has been stopped")]
    NavigationStopped,
    #[error("rejected goal: {0}")]
    InvalidGoal(String),
}
