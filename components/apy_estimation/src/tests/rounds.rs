use abci_engine::{PayloadError, PeriodState, Update};
use abci_roles::{testonly::participants, Payload, TransactionType, Value};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use test_casing::test_casing;

use super::{conclude, payloads, with_keeper};
use crate::{
    app,
    keys::{self, tx_type},
    Event, Round,
};

#[test]
fn registration_waits_for_everyone() {
    let ps = participants(4);
    let state = PeriodState::new(ps.clone());
    assert_eq!(
        conclude(
            Round::Registration,
            state.clone(),
            payloads(&ps[..3], tx_type::REGISTRATION, Value::Null)
        ),
        None
    );
    let (next, event) = conclude(
        Round::Registration,
        state,
        payloads(&ps, tx_type::REGISTRATION, Value::Null),
    )
    .unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(next.participants().len(), 4);
}

#[test]
fn registration_fast_forwards_when_deployed() {
    let ps = participants(4);
    let state = PeriodState::new(ps.clone()).update(
        Update::new()
            .scalar(keys::SAFE_CONTRACT_ADDRESS, "0xsafe")
            .scalar(keys::ORACLE_CONTRACT_ADDRESS, "0xoracle"),
    );
    let (_, event) = conclude(
        Round::Registration,
        state,
        payloads(&ps, tx_type::REGISTRATION, Value::Null),
    )
    .unwrap();
    assert_eq!(event, Event::FastForward);
}

#[test]
fn deploy_accepts_the_keeper_only() {
    let ps = participants(4);
    let app = app().unwrap();
    let mut round = app.new_round(Round::DeploySafe, with_keeper()).unwrap();
    assert_matches!(
        round.process_payload(Payload::new(ps[0].clone(), tx_type::DEPLOY_SAFE, "0xsafe")),
        Err(PayloadError::SenderNotAllowed { round_id: "deploy_safe", .. })
    );
    assert_eq!(round.end_block(), None);

    round
        .process_payload(Payload::new(ps[1].clone(), tx_type::DEPLOY_SAFE, "0xsafe"))
        .unwrap();
    let (state, event) = round.end_block().unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(
        state.scalar(keys::SAFE_CONTRACT_ADDRESS),
        Some(&Value::from("0xsafe"))
    );
    // The keeper is still known to later rounds.
    assert!(state.scalar(keys::MOST_VOTED_KEEPER_ADDRESS).is_some());
}

#[test]
fn deploy_without_keeper_accepts_nobody() {
    let ps = participants(4);
    let app = app().unwrap();
    let mut round = app
        .new_round(Round::DeployOracle, PeriodState::new(ps.clone()))
        .unwrap();
    for p in &ps {
        assert_matches!(
            round.process_payload(Payload::new(p.clone(), tx_type::DEPLOY_ORACLE, "0xoracle")),
            Err(PayloadError::SenderNotAllowed { .. })
        );
    }
}

#[test_casing(3, [
    (Value::Bool(true), Event::Done),
    (Value::Bool(false), Event::Negative),
    (Value::Null, Event::None),
])]
#[test]
fn validation_outcome(vote: Value, want: Event) {
    let ps = participants(4);
    for round in [
        Round::ValidateSafe,
        Round::ValidateOracle,
        Round::ValidateTransaction,
    ] {
        let (state, event) = conclude(
            round,
            PeriodState::new(ps.clone()),
            payloads(&ps[..3], tx_type::VALIDATE, vote.clone()),
        )
        .unwrap();
        assert_eq!(event, want);
        assert_eq!(state.collection(keys::PARTICIPANT_TO_VOTES).unwrap().len(), 3);
    }
}

#[test]
fn validation_rejects_non_boolean_votes() {
    let ps = participants(4);
    let app = app().unwrap();
    let mut round = app
        .new_round(Round::ValidateSafe, PeriodState::new(ps.clone()))
        .unwrap();
    assert_matches!(
        round.process_payload(Payload::new(ps[0].clone(), tx_type::VALIDATE, "yes")),
        Err(PayloadError::MalformedPayload { .. })
    );
}

#[test]
fn split_validation_has_no_majority() {
    let ps = participants(4);
    let mut votes = payloads(&ps[..2], tx_type::VALIDATE, true);
    votes.extend(payloads(&ps[2..], tx_type::VALIDATE, false));
    let (state, event) = conclude(
        Round::ValidateTransaction,
        PeriodState::new(ps.clone()),
        votes,
    )
    .unwrap();
    assert_eq!(event, Event::NoMajority);
    assert_eq!(state, PeriodState::new(ps));
}

#[test]
fn observations_are_transformed() {
    let ps = participants(4);
    let observations = ps[..3].iter().enumerate().map(|(i, p)| {
        let x = i as f64;
        Payload::new(
            p.clone(),
            tx_type::OBSERVATION,
            vec![Value::from(x + 0.5), Value::from(x)],
        )
    });
    let (state, event) = conclude(
        Round::CollectObservation,
        PeriodState::new(ps.clone()),
        observations,
    )
    .unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(
        state
            .collection(keys::PARTICIPANT_TO_OBSERVATIONS)
            .unwrap()
            .len(),
        3
    );
    let want: Vec<Value> = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5]
        .into_iter()
        .map(Value::from)
        .collect();
    assert_eq!(state.scalar(keys::TRANSFORMATION), Some(&Value::List(want)));
}

#[test]
fn estimate_consensus() {
    let ps = participants(4);
    let (state, event) = conclude(
        Round::EstimateConsensus,
        PeriodState::new(ps.clone()),
        payloads(&ps[1..], tx_type::ESTIMATE, 0.25),
    )
    .unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(
        state.scalar(keys::MOST_VOTED_ESTIMATE),
        Some(&Value::from(0.25))
    );
}

#[test]
fn estimate_consensus_accepts_floats_only() {
    let ps = participants(4);
    let app = app().unwrap();
    let mut round = app
        .new_round(Round::EstimateConsensus, PeriodState::new(ps.clone()))
        .unwrap();
    assert_matches!(
        round.process_payload(Payload::new(ps[0].clone(), tx_type::ESTIMATE, 3i64)),
        Err(PayloadError::MalformedPayload { .. })
    );
    assert_matches!(
        round.process_payload(Payload::new(ps[0].clone(), tx_type::ESTIMATE, f64::NAN)),
        Err(PayloadError::MalformedPayload { .. })
    );
    for p in &ps[..3] {
        round
            .process_payload(Payload::new(p.clone(), tx_type::ESTIMATE, 3.0))
            .unwrap();
    }
    let (state, event) = round.end_block().unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(state.scalar(keys::MOST_VOTED_ESTIMATE), Some(&Value::from(3.0)));
}

#[test]
fn finalization_by_keeper() {
    let ps = participants(4);
    let (state, event) = conclude(
        Round::Finalization,
        with_keeper(),
        [Payload::new(ps[1].clone(), tx_type::FINALIZATION, "0xhash")],
    )
    .unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(state.scalar(keys::FINAL_TX_HASH), Some(&Value::from("0xhash")));
}

#[test]
fn failed_finalization() {
    let ps = participants(4);
    let (state, event) = conclude(
        Round::Finalization,
        with_keeper(),
        [Payload::new(ps[1].clone(), tx_type::FINALIZATION, Value::Null)],
    )
    .unwrap();
    assert_eq!(event, Event::Failed);
    assert_eq!(state, with_keeper());
}

#[test_casing(2, [(Round::Reset, tx_type::RESET), (Round::ResetAndPause, tx_type::RESET_AND_PAUSE)])]
#[test]
fn reset_starts_the_next_period(round: Round, tx: TransactionType) {
    let ps = participants(4);
    let prior = with_keeper().update(Update::new().scalar(keys::SAFE_CONTRACT_ADDRESS, "0xsafe"));
    let (state, event) = conclude(round, prior, payloads(&ps, tx, 1i64)).unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(state.period_count(), 1);
    assert_eq!(state.scalar(keys::MOST_VOTED_KEEPER_ADDRESS), None);
    assert_eq!(
        state.scalar(keys::SAFE_CONTRACT_ADDRESS),
        Some(&Value::from("0xsafe"))
    );
    assert_eq!(state.participants().len(), 4);
}

#[test]
fn transform_adopts_the_most_submitted_transformation() {
    let ps = participants(4);
    let held: Vec<Value> = [1.0, 2.0, 3.0].into_iter().map(Value::from).collect();
    let state = PeriodState::new(ps.clone())
        .update(Update::new().scalar(keys::TRANSFORMATION, Value::List(held.clone())));
    let mut submissions = payloads(&ps[..3], tx_type::TRANSFORMATION, Value::List(held.clone()));
    submissions.push(Payload::new(
        ps[3].clone(),
        tx_type::TRANSFORMATION,
        vec![Value::from(9.0)],
    ));
    let (next, event) = conclude(Round::Transform, state, submissions).unwrap();
    assert_eq!(event, Event::Done);
    assert_eq!(
        next.collection(keys::PARTICIPANT_TO_TRANSFORMATION)
            .unwrap()
            .len(),
        4
    );
    // Resubmitting the held transformation leaves it unchanged.
    assert_eq!(next.scalar(keys::TRANSFORMATION), Some(&Value::List(held)));
}
