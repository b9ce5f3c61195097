use std::{sync::Arc, time::Instant};

use abci_engine::{
    attribute,
    testonly::{
        initial_state, reset_spec, transition_function, vote_spec, TestEvent,
        TestRound, OBSERVATION, ROUND_TIMEOUT,
    },
    AbciApp, Aggregate, Outcome, PeriodState, Quorum, RoundSpec, Threshold,
};

use crate::Driver;

mod driver;

/// Declares `Done`, but concludes with `NoMajority`, which the `Collect` row doesn't handle.
#[derive(Debug)]
struct Lying;

impl Aggregate<TestEvent> for Lying {
    fn events(&self) -> Vec<TestEvent> {
        vec![TestEvent::Done]
    }

    fn aggregate(&self, state: &PeriodState, _: Outcome<'_>) -> (PeriodState, TestEvent) {
        (state.clone(), TestEvent::NoMajority)
    }
}

fn lying_driver(n: usize, now: Instant) -> Driver<TestRound, TestEvent> {
    let collect = RoundSpec {
        round_id: "collect",
        allowed_tx_type: OBSERVATION,
        payload_attribute: attribute::any,
        quorum: Quorum::CollectDifferentUntilThreshold(Threshold::Consensus),
        aggregate: Arc::new(Lying),
    };
    let app = AbciApp::new(
        TestRound::Collect,
        [
            (TestRound::Collect, collect),
            (TestRound::Vote, vote_spec(Threshold::Consensus)),
            (TestRound::Reset, reset_spec()),
        ],
        transition_function(),
        [(TestEvent::RoundTimeout, ROUND_TIMEOUT)].into(),
    )
    .unwrap();
    Driver::new(app.into(), initial_state(n), now).unwrap()
}
