//! Test-only utilities: a small application exercising both quorum kinds.
use std::{collections::BTreeMap, sync::Arc, time::Duration};

use abci_roles::{testonly::participants, ParticipantId, Payload, TransactionType};

use crate::{
    attribute, AbciApp, CollectDistinct, CollectionKey, MostVoted, PeriodState, Quorum,
    ResetPeriod, RoundSpec, ScalarKey, Threshold,
};

/// Events of the test application.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestEvent {
    Done,
    NoMajority,
    RoundTimeout,
}

/// Round types of the test application.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestRound {
    Collect,
    Vote,
    Reset,
}

/// Timeout of `TestEvent::RoundTimeout`.
pub const ROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Transaction type of the `Collect` round.
pub const OBSERVATION: TransactionType = TransactionType::new("observation");
/// Transaction type of the `Vote` round.
pub const VOTE: TransactionType = TransactionType::new("vote");
/// Transaction type of the `Reset` round.
pub const RESET: TransactionType = TransactionType::new("reset");

/// Observations collected by the `Collect` round.
pub const PARTICIPANT_TO_OBSERVATIONS: CollectionKey = CollectionKey("participant_to_observations");
/// Votes collected by the `Vote` round.
pub const PARTICIPANT_TO_VOTES: CollectionKey = CollectionKey("participant_to_votes");
/// Value agreed on by the `Vote` round.
pub const MOST_VOTED: ScalarKey = ScalarKey("most_voted");

/// Spec of the `Collect` round: distinct observations from a consensus of participants.
pub fn collect_spec(threshold: Threshold) -> RoundSpec<TestEvent> {
    RoundSpec {
        round_id: "collect",
        allowed_tx_type: OBSERVATION,
        payload_attribute: attribute::any,
        quorum: Quorum::CollectDifferentUntilThreshold(threshold),
        aggregate: Arc::new(CollectDistinct {
            collection: PARTICIPANT_TO_OBSERVATIONS,
            event: TestEvent::Done,
        }),
    }
}

/// Spec of the `Vote` round: a consensus of participants agreeing on a text.
pub fn vote_spec(threshold: Threshold) -> RoundSpec<TestEvent> {
    RoundSpec {
        round_id: "vote",
        allowed_tx_type: VOTE,
        payload_attribute: attribute::text,
        quorum: Quorum::CollectSameUntilThreshold {
            threshold,
            no_majority: TestEvent::NoMajority,
        },
        aggregate: Arc::new(MostVoted {
            collection: PARTICIPANT_TO_VOTES,
            scalar: MOST_VOTED,
            event: TestEvent::Done,
        }),
    }
}

/// Spec of the `Reset` round.
pub fn reset_spec() -> RoundSpec<TestEvent> {
    RoundSpec {
        round_id: "reset",
        allowed_tx_type: RESET,
        payload_attribute: attribute::non_negative_int,
        quorum: Quorum::CollectSameUntilThreshold {
            threshold: Threshold::Consensus,
            no_majority: TestEvent::NoMajority,
        },
        aggregate: Arc::new(ResetPeriod {
            keep: &[],
            event: TestEvent::Done,
        }),
    }
}

/// Transition function of the test application.
pub fn transition_function() -> BTreeMap<TestRound, BTreeMap<TestEvent, TestRound>> {
    use TestEvent as E;
    use TestRound as R;
    BTreeMap::from([
        (
            R::Collect,
            BTreeMap::from([(E::Done, R::Vote), (E::RoundTimeout, R::Reset)]),
        ),
        (
            R::Vote,
            BTreeMap::from([
                (E::Done, R::Reset),
                (E::NoMajority, R::Vote),
                (E::RoundTimeout, R::Reset),
            ]),
        ),
        (
            R::Reset,
            BTreeMap::from([
                (E::Done, R::Collect),
                (E::NoMajority, R::Reset),
                (E::RoundTimeout, R::Reset),
            ]),
        ),
    ])
}

/// The test application: `Collect -> Vote -> Reset -> Collect`.
pub fn test_app() -> AbciApp<TestRound, TestEvent> {
    AbciApp::new(
        TestRound::Collect,
        [
            (TestRound::Collect, collect_spec(Threshold::Consensus)),
            (TestRound::Vote, vote_spec(Threshold::Consensus)),
            (TestRound::Reset, reset_spec()),
        ],
        transition_function(),
        BTreeMap::from([(TestEvent::RoundTimeout, ROUND_TIMEOUT)]),
    )
    .unwrap()
}

/// Initial period state with `n` participants.
pub fn initial_state(n: usize) -> PeriodState {
    PeriodState::new(participants(n))
}

/// Observation payload.
pub fn observation(sender: &ParticipantId, value: i64) -> Payload {
    Payload::new(sender.clone(), OBSERVATION, value)
}

/// Vote payload.
pub fn vote(sender: &ParticipantId, value: &str) -> Payload {
    Payload::new(sender.clone(), VOTE, value)
}

/// Reset payload.
pub fn reset(sender: &ParticipantId, period_count: i64) -> Payload {
    Payload::new(sender.clone(), RESET, period_count)
}
