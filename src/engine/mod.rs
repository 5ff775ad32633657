pub mod config;
pub mod generator;
pub mod maze;
pub mod robot;
pub mod telemetry;
