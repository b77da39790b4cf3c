pub mod api;
pub mod config;
pub mod db;
pub mod executors;
pub mod jobs;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use jobs::{JobQueue, QueueConfig};
