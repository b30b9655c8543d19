pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod modules;
pub mod progress;
pub mod report;
pub mod seq;
pub mod stats;
