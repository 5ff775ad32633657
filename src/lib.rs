// Maze robot simulation core: wall decoding, manual driving, and timed
// replay of runs submitted to a remote code-execution service.

pub mod animation;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod report;
pub mod run_service;
pub mod scheduler;
pub mod session;
pub mod submission;
