pub mod config;
pub mod process;
pub mod queues;
pub mod sessions;
pub mod setup;
pub mod stats;
pub mod tasks;
