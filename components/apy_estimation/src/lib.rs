//! APY estimation application.
//!
//! Participants register, agree on a keeper which deploys a safe and an oracle contract,
//! then periodically collect observations, agree on an estimate and settle it on chain
//! through the keeper. Every stage is a threshold-collection round of [`abci_engine`].
mod aggregate;
mod app;
pub mod behaviour;
pub mod keys;
pub mod transform;
#[cfg(test)]
mod tests;

pub use crate::{
    aggregate::{
        AdoptTransformation, CollectAndTransform, Finalize, KeeperOnly, Registration,
        ValidateVote,
    },
    app::{app, round_specs, transition_function, Event, Round, TIMEOUT},
};
