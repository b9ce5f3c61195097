//! Round-based consensus engine.
//!
//! Participants agree on a sequence of rounds. Every round collects payloads until a
//! quorum of participants has submitted matching (or enough distinct) contributions,
//! then deterministically computes a new [`PeriodState`] and an outcome event.
//! An [`AbciApp`] maps `(round type, event)` pairs to the next round type.
mod aggregate;
mod app;
pub mod attribute;
mod period_state;
mod round;
pub mod testonly;
#[cfg(test)]
mod tests;

pub use crate::{
    aggregate::{CollectDistinct, MostVoted, ResetPeriod},
    app::{AbciApp, ConfigError, Label, TransitionError, TransitionFunction},
    period_state::{Collection, CollectionKey, PeriodState, ScalarKey, Update},
    round::{
        consensus_threshold, Aggregate, CollectionRound, Outcome, PayloadAttribute, PayloadError,
        Quorum, RoundSpec, Threshold,
    },
};
