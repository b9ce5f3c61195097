//! Drives a round-based application: routes payloads to the active round,
//! evaluates it at the end of every block and schedules round timeouts.
mod config;
mod driver;
mod metrics;
mod runner;
pub mod testonly;
#[cfg(test)]
mod tests;

pub use crate::{
    config::Config,
    driver::{Driver, Error, Transition},
    runner::{Handle, Input, Runner, Status},
};
