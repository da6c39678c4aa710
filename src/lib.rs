#![doc = include_str!("../README.md")]
pub mod configuration;
pub mod correction;
pub mod driver;
pub mod error;
pub mod localiser;
pub mod logging;
pub mod navigation;
pub mod odometer;
pub mod pose;
pub mod robot;
pub mod sampler;
pub mod task;
pub mod wheel_command;
