//! Metrics for the driver.

use std::time::Duration;

use abci_engine::PayloadError;
use vise::{
    Buckets, Counter, EncodeLabelSet, EncodeLabelValue, Family, Gauge, Histogram, Metrics, Unit,
};

/// Reason for rejecting a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(rename_all = "snake_case")]
pub(crate) enum RejectionReason {
    InvalidPayload,
    MalformedPayload,
    NotAParticipant,
    SenderNotAllowed,
    DuplicateSender,
}

impl From<&PayloadError> for RejectionReason {
    fn from(err: &PayloadError) -> Self {
        match err {
            PayloadError::InvalidPayload { .. } => Self::InvalidPayload,
            PayloadError::MalformedPayload { .. } => Self::MalformedPayload,
            PayloadError::NotAParticipant { .. } => Self::NotAParticipant,
            PayloadError::SenderNotAllowed { .. } => Self::SenderNotAllowed,
            PayloadError::DuplicateSender { .. } => Self::DuplicateSender,
        }
    }
}

/// Labels for rejected payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelSet)]
pub(crate) struct RejectionLabels {
    pub(crate) reason: RejectionReason,
}

/// Labels for round transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub(crate) struct TransitionLabels {
    /// Round the transition leaves.
    pub(crate) round: String,
    /// Event triggering the transition.
    pub(crate) event: String,
}

/// Metrics defined by the driver.
#[derive(Debug, Metrics)]
#[metrics(prefix = "abci_driver")]
pub(crate) struct DriverMetrics {
    /// Number of round transitions.
    pub(crate) round_transitions: Family<TransitionLabels, Counter>,
    /// Number of transitions forced by a timeout.
    pub(crate) round_timeouts: Counter,
    /// Number of payloads rejected by the active round.
    pub(crate) rejected_payloads: Family<RejectionLabels, Counter>,
    /// Number of the current period.
    pub(crate) period_count: Gauge<u64>,
    /// Time spent in a round, from its activation until the transition out of it.
    #[metrics(unit = Unit::Seconds, buckets = Buckets::LATENCIES)]
    pub(crate) round_latency: Histogram<Duration>,
}

/// Global instance of [`DriverMetrics`].
#[vise::register]
pub(crate) static METRICS: vise::Global<DriverMetrics> = vise::Global::new();
