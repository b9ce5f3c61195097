//! Threshold-collection rounds.
//!
//! A round type is described by a static [`RoundSpec`]: the transaction type it accepts,
//! a typed accessor reading the relevant part of each payload, the quorum it waits for
//! and the [`Aggregate`] strategy computing its output. Every activation of a round type
//! is a fresh [`CollectionRound`] which accumulates at most one payload per participant.
use std::{collections::BTreeMap, collections::BTreeSet, fmt, sync::Arc};

use abci_roles::{ParticipantId, Payload, TransactionType, Value};

use crate::period_state::{Collection, PeriodState};

/// Minimal number of participants required to reach consensus among `n` participants,
/// i.e. more than two thirds of them.
pub fn consensus_threshold(n: usize) -> usize {
    (2 * n + 1).div_ceil(3)
}

/// Number of contributions a round waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// More than two thirds of the participants, see [`consensus_threshold`].
    Consensus,
    /// Every participant.
    All,
    /// A fixed number of contributions.
    Fixed(usize),
}

impl Threshold {
    /// Number of contributions required for a period with `participants` participants.
    pub fn count(self, participants: usize) -> usize {
        match self {
            Self::Consensus => consensus_threshold(participants),
            Self::All => participants,
            Self::Fixed(k) => k,
        }
    }
}

/// Completion condition of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quorum<E> {
    /// Completes once `threshold` distinct participants have contributed.
    /// Their values may differ and are all retained.
    CollectDifferentUntilThreshold(Threshold),
    /// Completes once `threshold` participants have contributed the same value.
    /// Once no value can reach the threshold anymore, the round concludes with `no_majority`.
    CollectSameUntilThreshold {
        /// Required number of matching contributions.
        threshold: Threshold,
        /// Event emitted when agreement became impossible.
        no_majority: E,
    },
}

impl<E> Quorum<E> {
    /// Threshold of the quorum.
    pub fn threshold(&self) -> Threshold {
        match self {
            Self::CollectDifferentUntilThreshold(t) => *t,
            Self::CollectSameUntilThreshold { threshold, .. } => *threshold,
        }
    }
}

/// What a round collected by the time its quorum was reached.
#[derive(Debug, Clone)]
pub enum Outcome<'a> {
    /// Enough distinct participants contributed.
    Collected {
        /// All collected payloads.
        collection: &'a Collection,
        /// Payload attributes, ordered by sender.
        values: Vec<&'a Value>,
    },
    /// Enough participants agreed on `value`.
    Agreed {
        /// The most voted payload attribute.
        value: &'a Value,
        /// All collected payloads, including the dissenting ones.
        collection: &'a Collection,
    },
}

impl Outcome<'_> {
    /// All payloads collected by the round.
    pub fn collection(&self) -> &Collection {
        match self {
            Self::Collected { collection, .. } | Self::Agreed { collection, .. } => collection,
        }
    }
}

/// Aggregation strategy of a round type.
pub trait Aggregate<E>: fmt::Debug + Send + Sync {
    /// Events which `aggregate` may return.
    fn events(&self) -> Vec<E>;

    /// Whether `sender` may contribute to the round. All participants may by default.
    fn accepts_sender(&self, _state: &PeriodState, _sender: &ParticipantId) -> bool {
        true
    }

    /// Computes the next period state and the outcome event.
    /// Has to be a pure function of its arguments.
    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, E);
}

/// Typed accessor reading the attribute of a payload that a round cares about.
/// Returns `None` if the payload is malformed for the round.
pub type PayloadAttribute = fn(&Payload) -> Option<&Value>;

/// Static description of a round type.
#[derive(Clone)]
pub struct RoundSpec<E> {
    /// Human-readable round identifier.
    pub round_id: &'static str,
    /// The only transaction type accepted by the round.
    pub allowed_tx_type: TransactionType,
    /// Accessor of the relevant payload attribute.
    pub payload_attribute: PayloadAttribute,
    /// Completion condition.
    pub quorum: Quorum<E>,
    /// Aggregation performed once the quorum is reached.
    pub aggregate: Arc<dyn Aggregate<E>>,
}

impl<E: fmt::Debug> fmt::Debug for RoundSpec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundSpec")
            .field("round_id", &self.round_id)
            .field("allowed_tx_type", &self.allowed_tx_type)
            .field("quorum", &self.quorum)
            .field("aggregate", &self.aggregate)
            .finish_non_exhaustive()
    }
}

impl<E: Copy + Ord> RoundSpec<E> {
    /// All events the round can conclude with.
    pub fn emitted_events(&self) -> BTreeSet<E> {
        let mut events: BTreeSet<E> = self.aggregate.events().into_iter().collect();
        if let Quorum::CollectSameUntilThreshold { no_majority, .. } = &self.quorum {
            events.insert(*no_majority);
        }
        events
    }
}

/// Errors that can occur when delivering a payload to a round.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Transaction type doesn't match the round.
    #[error("invalid payload for round {round_id} (expected: {expected}, got: {got})")]
    InvalidPayload {
        /// Active round.
        round_id: &'static str,
        /// Transaction type accepted by the round.
        expected: TransactionType,
        /// Transaction type of the payload.
        got: TransactionType,
    },
    /// Payload value can't be read by the round's attribute accessor.
    #[error("malformed {tx_type} payload for round {round_id} (sender: {sender:?})")]
    MalformedPayload {
        /// Active round.
        round_id: &'static str,
        /// Transaction type of the payload.
        tx_type: TransactionType,
        /// Sender of the payload.
        sender: ParticipantId,
    },
    /// Sender isn't part of the period's participants.
    #[error("sender isn't a participant of the period (sender: {sender:?})")]
    NotAParticipant {
        /// Sender of the payload.
        sender: ParticipantId,
    },
    /// Sender is a participant, but the round doesn't accept contributions from it.
    #[error("sender isn't allowed to contribute to round {round_id} (sender: {sender:?})")]
    SenderNotAllowed {
        /// Active round.
        round_id: &'static str,
        /// Sender of the payload.
        sender: ParticipantId,
    },
    /// Sender has already contributed to the round. The first contribution wins.
    #[error("duplicate sender in round {round_id} (sender: {sender:?})")]
    DuplicateSender {
        /// Active round.
        round_id: &'static str,
        /// Sender of the payload.
        sender: ParticipantId,
    },
}

/// A single activation of a round type.
#[derive(Debug)]
pub struct CollectionRound<E> {
    spec: Arc<RoundSpec<E>>,
    state: PeriodState,
    collection: Collection,
}

impl<E: Copy + fmt::Debug> CollectionRound<E> {
    /// Activates a round with the period state of the moment.
    pub fn new(spec: Arc<RoundSpec<E>>, state: PeriodState) -> Self {
        Self {
            spec,
            state,
            collection: Collection::new(),
        }
    }

    /// Identifier of the round type.
    pub fn round_id(&self) -> &'static str {
        self.spec.round_id
    }

    /// Specification of the round type.
    pub fn spec(&self) -> &RoundSpec<E> {
        &self.spec
    }

    /// Period state the round was activated with.
    pub fn period_state(&self) -> &PeriodState {
        &self.state
    }

    /// Payloads collected so far.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Checks whether `payload` would be accepted, without recording it.
    pub fn check_payload(&self, payload: &Payload) -> Result<(), PayloadError> {
        let round_id = self.round_id();
        if payload.tx_type != self.spec.allowed_tx_type {
            return Err(PayloadError::InvalidPayload {
                round_id,
                expected: self.spec.allowed_tx_type.clone(),
                got: payload.tx_type.clone(),
            });
        }
        if !self.state.is_participant(&payload.sender) {
            return Err(PayloadError::NotAParticipant {
                sender: payload.sender.clone(),
            });
        }
        if !self
            .spec
            .aggregate
            .accepts_sender(&self.state, &payload.sender)
        {
            return Err(PayloadError::SenderNotAllowed {
                round_id,
                sender: payload.sender.clone(),
            });
        }
        if self.collection.contains_key(&payload.sender) {
            return Err(PayloadError::DuplicateSender {
                round_id,
                sender: payload.sender.clone(),
            });
        }
        if (self.spec.payload_attribute)(payload).is_none() {
            return Err(PayloadError::MalformedPayload {
                round_id,
                tx_type: payload.tx_type.clone(),
                sender: payload.sender.clone(),
            });
        }
        Ok(())
    }

    /// Records `payload` in the round's collection.
    /// Only the round instance is modified, never the period state.
    pub fn process_payload(&mut self, payload: Payload) -> Result<(), PayloadError> {
        self.check_payload(&payload)?;
        self.collection.insert(payload.sender.clone(), payload);
        Ok(())
    }

    /// Number of contributions required by the quorum.
    pub fn threshold(&self) -> usize {
        self.spec
            .quorum
            .threshold()
            .count(self.state.participants().len())
    }

    /// Whether enough distinct participants have contributed.
    pub fn collection_threshold_reached(&self) -> bool {
        self.collection.len() >= self.threshold()
    }

    /// Most voted attribute with its number of votes. Ties are broken in favor
    /// of the smallest value, so that every replica picks the same one.
    pub fn most_voted(&self) -> Option<(&Value, usize)> {
        let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
        for payload in self.collection.values() {
            if let Some(value) = (self.spec.payload_attribute)(payload) {
                *counts.entry(value).or_default() += 1;
            }
        }
        let mut best: Option<(&Value, usize)> = None;
        for (value, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }
        best
    }

    /// Whether the quorum condition of the round holds.
    pub fn threshold_reached(&self) -> bool {
        match &self.spec.quorum {
            Quorum::CollectDifferentUntilThreshold(_) => self.collection_threshold_reached(),
            Quorum::CollectSameUntilThreshold { .. } => self
                .most_voted()
                .is_some_and(|(_, count)| count >= self.threshold()),
        }
    }

    /// Whether some value can still gather enough matching contributions,
    /// assuming every participant which hasn't contributed yet votes for it.
    /// An empty round always may.
    pub fn is_majority_possible(&self) -> bool {
        if self.collection.is_empty() {
            return true;
        }
        let top = self.most_voted().map_or(0, |(_, count)| count);
        let remaining = self
            .state
            .participants()
            .len()
            .saturating_sub(self.collection.len());
        top + remaining >= self.threshold()
    }

    /// Evaluates the round. Returns `None` while the round hasn't concluded.
    ///
    /// This is a pure function of the collection and the period state the round
    /// was activated with, so that replicas processing the same payloads conclude identically.
    pub fn end_block(&self) -> Option<(PeriodState, E)> {
        match &self.spec.quorum {
            Quorum::CollectDifferentUntilThreshold(_) => {
                if !self.collection_threshold_reached() {
                    return None;
                }
                let values = self
                    .collection
                    .values()
                    .filter_map(|p| (self.spec.payload_attribute)(p))
                    .collect();
                Some(self.spec.aggregate.aggregate(
                    &self.state,
                    Outcome::Collected {
                        collection: &self.collection,
                        values,
                    },
                ))
            }
            Quorum::CollectSameUntilThreshold { no_majority, .. } => {
                if let Some((value, count)) = self.most_voted() {
                    if count >= self.threshold() {
                        return Some(self.spec.aggregate.aggregate(
                            &self.state,
                            Outcome::Agreed {
                                value,
                                collection: &self.collection,
                            },
                        ));
                    }
                }
                if !self.is_majority_possible() {
                    return Some((self.state.clone(), *no_majority));
                }
                None
            }
        }
    }
}
