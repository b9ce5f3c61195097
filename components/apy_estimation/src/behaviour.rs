//! Payloads of an honest participant.
use abci_engine::{PeriodState, ScalarKey};
use abci_roles::{ParticipantId, Payload, Value};

use crate::{
    keys::{self, tx_type},
    Round,
};

/// Participant expected to be elected keeper in `round`.
/// A retry (`SelectKeeperB*`) moves on to the next participant.
pub fn keeper(round: Round, state: &PeriodState) -> Option<&ParticipantId> {
    let n = state.participants().len();
    if n == 0 {
        return None;
    }
    let offset = match round {
        Round::SelectKeeperBStartup | Round::SelectKeeperB => 1,
        _ => 0,
    };
    let period = usize::try_from(state.period_count()).ok()?;
    state
        .participants()
        .iter()
        .nth(period.wrapping_add(offset) % n)
}

fn is_keeper(state: &PeriodState, sender: &ParticipantId) -> bool {
    state
        .scalar(keys::MOST_VOTED_KEEPER_ADDRESS)
        .and_then(Value::as_text)
        .is_some_and(|k| k == sender.as_str())
}

fn text(state: &PeriodState, key: ScalarKey) -> Option<String> {
    state.scalar(key).and_then(Value::as_text).map(str::to_owned)
}

/// Observation of `sender` in the current period.
fn observation(state: &PeriodState, sender: &ParticipantId) -> Value {
    let index = state
        .participants()
        .iter()
        .position(|p| p == sender)
        .unwrap_or_default();
    let period = i64::try_from(state.period_count()).unwrap_or(i64::MAX);
    let index = i64::try_from(index).unwrap_or(i64::MAX);
    Value::List(vec![Value::Int(period), Value::Int(index)])
}

/// Median of the transformation.
fn estimate(state: &PeriodState) -> Option<Value> {
    let samples = state.scalar(keys::TRANSFORMATION)?.as_list()?;
    samples.get(samples.len() / 2).cloned()
}

/// Payload an honest `sender` submits to the active `round`, given the period state
/// the round was activated with. `None` if the sender has nothing to contribute.
///
/// Every honest participant derives the same payload for the same-value rounds,
/// so that a consensus of honest participants always agrees.
pub fn honest_payload(
    round: Round,
    state: &PeriodState,
    sender: &ParticipantId,
) -> Option<Payload> {
    use Round as R;
    let (tx, value): (_, Value) = match round {
        R::Registration => (tx_type::REGISTRATION, Value::Null),
        R::RandomnessStartup | R::Randomness => (
            tx_type::RANDOMNESS,
            format!("randomness_{}", state.period_count()).into(),
        ),
        R::SelectKeeperAStartup | R::SelectKeeperBStartup | R::SelectKeeperA | R::SelectKeeperB => {
            (tx_type::SELECT_KEEPER, keeper(round, state)?.as_str().into())
        }
        R::DeploySafe | R::DeployOracle | R::Finalization if !is_keeper(state, sender) => {
            return None
        }
        R::DeploySafe => (
            tx_type::DEPLOY_SAFE,
            format!("0xsafe_{}", state.period_count()).into(),
        ),
        R::DeployOracle => (
            tx_type::DEPLOY_ORACLE,
            format!("0xoracle_{}", state.period_count()).into(),
        ),
        R::Finalization => (
            tx_type::FINALIZATION,
            format!("0xfinal_{}", text(state, keys::MOST_VOTED_TX_HASH)?).into(),
        ),
        R::ValidateSafe | R::ValidateOracle | R::ValidateTransaction => {
            (tx_type::VALIDATE, true.into())
        }
        R::CollectObservation => (tx_type::OBSERVATION, observation(state, sender)),
        R::Transform => (
            tx_type::TRANSFORMATION,
            state.scalar(keys::TRANSFORMATION)?.clone(),
        ),
        R::EstimateConsensus => (tx_type::ESTIMATE, estimate(state)?),
        R::TxHash => (
            tx_type::TX_HASH,
            format!("0xtx_{}", state.period_count()).into(),
        ),
        R::CollectSignature => (
            tx_type::SIGNATURE,
            format!("sig_{sender}_{}", text(state, keys::MOST_VOTED_TX_HASH)?).into(),
        ),
        R::Reset | R::ResetAndPause => {
            let tx = if round == R::Reset {
                tx_type::RESET
            } else {
                tx_type::RESET_AND_PAUSE
            };
            let next = i64::try_from(state.period_count()).ok()?.checked_add(1)?;
            (tx, next.into())
        }
    };
    Some(Payload::new(sender.clone(), tx, value))
}
