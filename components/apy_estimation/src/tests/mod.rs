use abci_engine::{PeriodState, Update};
use abci_roles::{testonly::participants, ParticipantId, Payload, TransactionType, Value};

use crate::{keys, Event, Round};

mod rounds;

/// Feeds `payloads` to a fresh instance of `round` and returns its outcome.
fn conclude(
    round: Round,
    state: PeriodState,
    payloads: impl IntoIterator<Item = Payload>,
) -> Option<(PeriodState, Event)> {
    let app = crate::app().unwrap();
    let mut round = app.new_round(round, state).unwrap();
    for payload in payloads {
        round.process_payload(payload).unwrap();
    }
    round.end_block()
}

/// Same payload value from each of `senders`.
fn payloads(
    senders: &[ParticipantId],
    tx_type: TransactionType,
    value: impl Into<Value> + Clone,
) -> Vec<Payload> {
    senders
        .iter()
        .map(|p| Payload::new(p.clone(), tx_type.clone(), value.clone()))
        .collect()
}

/// State of 4 participants with `agent_1` elected as keeper.
fn with_keeper() -> PeriodState {
    PeriodState::new(participants(4))
        .update(Update::new().scalar(keys::MOST_VOTED_KEEPER_ADDRESS, "agent_1"))
}
