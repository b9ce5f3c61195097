//! Rounds and transition function of the application.
use std::{collections::BTreeMap, sync::Arc, time::Duration};

use abci_engine::{
    attribute, AbciApp, Aggregate, CollectDistinct, ConfigError, MostVoted, PayloadAttribute, Quorum,
    ResetPeriod, RoundSpec, Threshold, TransitionFunction,
};
use abci_roles::TransactionType;

use crate::{
    aggregate::{
        AdoptTransformation, CollectAndTransform, Finalize, KeeperOnly, Registration,
        ValidateVote,
    },
    keys::{self, tx_type},
};

/// Outcome events of the application's rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Event {
    /// Round concluded successfully.
    Done,
    /// Round didn't conclude in time.
    RoundTimeout,
    /// No value can gather a consensus anymore.
    NoMajority,
    /// Validation failed.
    Negative,
    /// Validation couldn't be performed.
    None,
    /// Validation round didn't conclude in time.
    ValidateTimeout,
    /// Keeper didn't deploy in time.
    DeployTimeout,
    /// Reset round didn't conclude in time.
    ResetTimeout,
    /// Setup is already done, skip it.
    FastForward,
    /// Keeper couldn't send the transaction.
    Failed,
}

/// Round types of the application.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Round {
    Registration,
    RandomnessStartup,
    SelectKeeperAStartup,
    DeploySafe,
    ValidateSafe,
    DeployOracle,
    SelectKeeperBStartup,
    ValidateOracle,
    Randomness,
    SelectKeeperA,
    CollectObservation,
    Transform,
    EstimateConsensus,
    TxHash,
    CollectSignature,
    Finalization,
    ValidateTransaction,
    SelectKeeperB,
    Reset,
    ResetAndPause,
}

/// Duration of every timeout event.
pub const TIMEOUT: Duration = Duration::from_secs(30);

fn collect_different(
    round_id: &'static str,
    allowed_tx_type: TransactionType,
    payload_attribute: PayloadAttribute,
    threshold: Threshold,
    aggregate: impl Aggregate<Event> + 'static,
) -> RoundSpec<Event> {
    RoundSpec {
        round_id,
        allowed_tx_type,
        payload_attribute,
        quorum: Quorum::CollectDifferentUntilThreshold(threshold),
        aggregate: Arc::new(aggregate),
    }
}

fn collect_same(
    round_id: &'static str,
    allowed_tx_type: TransactionType,
    payload_attribute: PayloadAttribute,
    aggregate: impl Aggregate<Event> + 'static,
) -> RoundSpec<Event> {
    RoundSpec {
        round_id,
        allowed_tx_type,
        payload_attribute,
        quorum: Quorum::CollectSameUntilThreshold {
            threshold: Threshold::Consensus,
            no_majority: Event::NoMajority,
        },
        aggregate: Arc::new(aggregate),
    }
}

fn randomness(round_id: &'static str) -> RoundSpec<Event> {
    collect_same(
        round_id,
        tx_type::RANDOMNESS,
        attribute::text,
        MostVoted {
            collection: keys::PARTICIPANT_TO_RANDOMNESS,
            scalar: keys::MOST_VOTED_RANDOMNESS,
            event: Event::Done,
        },
    )
}

fn select_keeper(round_id: &'static str) -> RoundSpec<Event> {
    collect_same(
        round_id,
        tx_type::SELECT_KEEPER,
        attribute::text,
        MostVoted {
            collection: keys::PARTICIPANT_TO_SELECTION,
            scalar: keys::MOST_VOTED_KEEPER_ADDRESS,
            event: Event::Done,
        },
    )
}

fn validate(round_id: &'static str) -> RoundSpec<Event> {
    collect_same(
        round_id,
        tx_type::VALIDATE,
        attribute::bool_or_null,
        ValidateVote,
    )
}

fn reset(round_id: &'static str, allowed_tx_type: TransactionType) -> RoundSpec<Event> {
    collect_same(
        round_id,
        allowed_tx_type,
        attribute::non_negative_int,
        ResetPeriod {
            keep: &[keys::SAFE_CONTRACT_ADDRESS, keys::ORACLE_CONTRACT_ADDRESS],
            event: Event::Done,
        },
    )
}

/// Specs of every round type.
pub fn round_specs() -> Vec<(Round, RoundSpec<Event>)> {
    use Round as R;
    vec![
        (
            R::Registration,
            collect_different(
                "registration",
                tx_type::REGISTRATION,
                attribute::any,
                Threshold::All,
                Registration,
            ),
        ),
        (R::RandomnessStartup, randomness("randomness_startup")),
        (R::SelectKeeperAStartup, select_keeper("select_keeper_a_startup")),
        (
            R::DeploySafe,
            collect_different(
                "deploy_safe",
                tx_type::DEPLOY_SAFE,
                attribute::text,
                Threshold::Fixed(1),
                KeeperOnly {
                    scalar: keys::SAFE_CONTRACT_ADDRESS,
                },
            ),
        ),
        (R::ValidateSafe, validate("validate_safe")),
        (
            R::DeployOracle,
            collect_different(
                "deploy_oracle",
                tx_type::DEPLOY_ORACLE,
                attribute::text,
                Threshold::Fixed(1),
                KeeperOnly {
                    scalar: keys::ORACLE_CONTRACT_ADDRESS,
                },
            ),
        ),
        (R::SelectKeeperBStartup, select_keeper("select_keeper_b_startup")),
        (R::ValidateOracle, validate("validate_oracle")),
        (R::Randomness, randomness("randomness")),
        (R::SelectKeeperA, select_keeper("select_keeper_a")),
        (
            R::CollectObservation,
            collect_different(
                "collect_observation",
                tx_type::OBSERVATION,
                attribute::number_list,
                Threshold::Consensus,
                CollectAndTransform {
                    collection: keys::PARTICIPANT_TO_OBSERVATIONS,
                },
            ),
        ),
        (
            R::Transform,
            collect_different(
                "transform",
                tx_type::TRANSFORMATION,
                attribute::number_list,
                Threshold::Consensus,
                AdoptTransformation {
                    collection: keys::PARTICIPANT_TO_TRANSFORMATION,
                },
            ),
        ),
        (
            R::EstimateConsensus,
            collect_same(
                "estimate_consensus",
                tx_type::ESTIMATE,
                attribute::float,
                MostVoted {
                    collection: keys::PARTICIPANT_TO_ESTIMATE,
                    scalar: keys::MOST_VOTED_ESTIMATE,
                    event: Event::Done,
                },
            ),
        ),
        (
            R::TxHash,
            collect_same(
                "tx_hash",
                tx_type::TX_HASH,
                attribute::text,
                MostVoted {
                    collection: keys::PARTICIPANT_TO_TX_HASH,
                    scalar: keys::MOST_VOTED_TX_HASH,
                    event: Event::Done,
                },
            ),
        ),
        (
            R::CollectSignature,
            collect_different(
                "collect_signature",
                tx_type::SIGNATURE,
                attribute::text,
                Threshold::Consensus,
                CollectDistinct {
                    collection: keys::PARTICIPANT_TO_SIGNATURE,
                    event: Event::Done,
                },
            ),
        ),
        (
            R::Finalization,
            collect_different(
                "finalization",
                tx_type::FINALIZATION,
                attribute::text_or_null,
                Threshold::Fixed(1),
                Finalize {
                    scalar: keys::FINAL_TX_HASH,
                },
            ),
        ),
        (R::ValidateTransaction, validate("validate_transaction")),
        (R::SelectKeeperB, select_keeper("select_keeper_b")),
        (R::Reset, reset("reset", tx_type::RESET)),
        (
            R::ResetAndPause,
            reset("reset_and_pause", tx_type::RESET_AND_PAUSE),
        ),
    ]
}

/// Transition function of the application.
pub fn transition_function() -> TransitionFunction<Round, Event> {
    use Event as E;
    use Round as R;
    let rows = [
        (
            R::Registration,
            vec![
                (E::Done, R::RandomnessStartup),
                (E::FastForward, R::Randomness),
                // Registration waits for every participant; keep waiting.
                (E::RoundTimeout, R::Registration),
            ],
        ),
        (
            R::RandomnessStartup,
            vec![
                (E::Done, R::SelectKeeperAStartup),
                (E::RoundTimeout, R::RandomnessStartup),
                // Participants can be on either side of an epoch, retry.
                (E::NoMajority, R::RandomnessStartup),
            ],
        ),
        (
            R::SelectKeeperAStartup,
            vec![
                (E::Done, R::DeploySafe),
                (E::RoundTimeout, R::Registration),
                (E::NoMajority, R::Registration),
            ],
        ),
        (
            R::DeploySafe,
            vec![
                (E::Done, R::ValidateSafe),
                // Try with a new keeper.
                (E::DeployTimeout, R::SelectKeeperAStartup),
            ],
        ),
        (
            R::ValidateSafe,
            vec![
                (E::Done, R::DeployOracle),
                (E::Negative, R::Registration),
                (E::None, R::Registration),
                (E::ValidateTimeout, R::Registration),
                (E::NoMajority, R::Registration),
            ],
        ),
        (
            R::DeployOracle,
            vec![
                (E::Done, R::ValidateOracle),
                (E::DeployTimeout, R::SelectKeeperBStartup),
            ],
        ),
        (
            R::SelectKeeperBStartup,
            vec![
                (E::Done, R::DeployOracle),
                (E::RoundTimeout, R::Registration),
                (E::NoMajority, R::Registration),
            ],
        ),
        (
            R::ValidateOracle,
            vec![
                (E::Done, R::Randomness),
                (E::Negative, R::Registration),
                (E::None, R::Registration),
                (E::ValidateTimeout, R::Registration),
                (E::NoMajority, R::Registration),
            ],
        ),
        (
            R::Randomness,
            vec![
                (E::Done, R::SelectKeeperA),
                (E::RoundTimeout, R::Reset),
                (E::NoMajority, R::Randomness),
            ],
        ),
        (
            R::SelectKeeperA,
            vec![
                (E::Done, R::CollectObservation),
                (E::RoundTimeout, R::Reset),
                (E::NoMajority, R::Reset),
            ],
        ),
        (
            R::CollectObservation,
            vec![(E::Done, R::Transform), (E::RoundTimeout, R::Reset)],
        ),
        (
            R::Transform,
            vec![(E::Done, R::EstimateConsensus), (E::RoundTimeout, R::Reset)],
        ),
        (
            R::EstimateConsensus,
            vec![
                (E::Done, R::TxHash),
                (E::RoundTimeout, R::Reset),
                (E::NoMajority, R::Reset),
            ],
        ),
        (
            R::TxHash,
            vec![
                (E::Done, R::CollectSignature),
                (E::RoundTimeout, R::Reset),
                (E::NoMajority, R::Reset),
            ],
        ),
        (
            R::CollectSignature,
            vec![
                (E::Done, R::Finalization),
                (E::RoundTimeout, R::Reset),
                (E::NoMajority, R::Reset),
            ],
        ),
        (
            R::Finalization,
            vec![
                (E::Done, R::ValidateTransaction),
                (E::RoundTimeout, R::SelectKeeperB),
                (E::Failed, R::SelectKeeperB),
            ],
        ),
        (
            R::ValidateTransaction,
            vec![
                (E::Done, R::ResetAndPause),
                (E::Negative, R::Reset),
                (E::None, R::Reset),
                (E::ValidateTimeout, R::Reset),
                // Participants observe the chain differently, agree before moving on.
                (E::NoMajority, R::ValidateTransaction),
            ],
        ),
        (
            R::SelectKeeperB,
            vec![
                (E::Done, R::Finalization),
                (E::RoundTimeout, R::Reset),
                (E::NoMajority, R::Reset),
            ],
        ),
        (
            R::Reset,
            vec![
                (E::Done, R::Randomness),
                (E::RoundTimeout, R::Registration),
                (E::NoMajority, R::Registration),
            ],
        ),
        (
            R::ResetAndPause,
            vec![
                (E::Done, R::Randomness),
                (E::ResetTimeout, R::Registration),
                (E::NoMajority, R::Registration),
            ],
        ),
    ];
    rows.into_iter()
        .map(|(round, row)| (round, row.into_iter().collect()))
        .collect()
}

/// Timeouts of the timeout events.
fn event_to_timeout() -> BTreeMap<Event, Duration> {
    [
        Event::RoundTimeout,
        Event::ValidateTimeout,
        Event::DeployTimeout,
        Event::ResetTimeout,
    ]
    .into_iter()
    .map(|e| (e, TIMEOUT))
    .collect()
}

/// The APY estimation application, starting with `Registration`.
pub fn app() -> Result<AbciApp<Round, Event>, ConfigError> {
    AbciApp::new(
        Round::Registration,
        round_specs(),
        transition_function(),
        event_to_timeout(),
    )
}
