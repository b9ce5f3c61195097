//! Tools for the ABCI rounds applications.
mod config;
mod simulator;

pub use crate::{
    config::{decode_json, SimulatorConfig},
    simulator::{Report, Simulator},
};
