//! This crate provides the types exchanged between the participants of a round-based
//! application and the engine that drives it.
//!
//! - `ParticipantId`: identity of an agent taking part in the period.
//! - `Payload`: a single participant's typed contribution to the active round.
//! - `Value`: the totally ordered dynamic value carried by a payload and stored in the period state.

mod participant;
mod payload;
pub mod testonly;
mod value;

pub use self::{
    participant::ParticipantId,
    payload::{Payload, TransactionType},
    value::{Float, Value},
};
