use std::time::{Duration, Instant};

use abci_engine::{
    testonly::{
        initial_state, observation, reset, vote, TestEvent as E, TestRound as R, MOST_VOTED,
        PARTICIPANT_TO_OBSERVATIONS, PARTICIPANT_TO_VOTES, ROUND_TIMEOUT,
    },
    PayloadError, TransitionError,
};
use abci_roles::{testonly::participants, Payload, Value};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rand::{seq::SliceRandom as _, Rng as _, SeedableRng as _};
use test_casing::test_casing;

use super::lying_driver;
use crate::{testonly::test_driver, Error, Transition};

#[test]
fn initial_round_is_active() {
    let now = Instant::now();
    let driver = test_driver(4, now);
    assert_eq!(driver.current_round(), R::Collect);
    assert_eq!(driver.round_count(), 0);
    assert_eq!(driver.period_state(), &initial_state(4));
    assert_eq!(
        driver.next_deadline(),
        Some((now + ROUND_TIMEOUT, E::RoundTimeout))
    );
}

#[test]
fn full_period() {
    let ps = participants(4);
    let t0 = Instant::now();
    let mut driver = test_driver(4, t0);

    // Consensus threshold of 4 participants is 3.
    for (i, p) in ps[..2].iter().enumerate() {
        assert_eq!(driver.process_payload(observation(p, i as i64), t0).unwrap(), None);
    }
    let t1 = t0 + Duration::from_secs(1);
    assert_eq!(
        driver.process_payload(observation(&ps[2], 2), t1).unwrap(),
        Some(Transition {
            from: R::Collect,
            event: E::Done,
            to: R::Vote,
            period_count: 0,
            version: 1,
        })
    );
    assert_eq!(
        driver.next_deadline(),
        Some((t1 + ROUND_TIMEOUT, E::RoundTimeout))
    );
    let observations = driver
        .period_state()
        .collection(PARTICIPANT_TO_OBSERVATIONS)
        .unwrap();
    assert_eq!(observations.len(), 3);

    for p in &ps[..3] {
        driver.deliver_payload(vote(p, "x")).unwrap();
    }
    let transition = driver.end_block(t1).unwrap().unwrap();
    assert_eq!((transition.from, transition.to), (R::Vote, R::Reset));
    let state = driver.period_state();
    assert_eq!(state.scalar(MOST_VOTED), Some(&Value::Text("x".into())));
    assert_eq!(state.collection(PARTICIPANT_TO_VOTES).unwrap().len(), 3);
    // Earlier outputs are still there.
    assert!(state.collection(PARTICIPANT_TO_OBSERVATIONS).is_some());

    for p in &ps {
        driver.deliver_payload(reset(p, 1)).unwrap();
    }
    let transition = driver.end_block(t1).unwrap().unwrap();
    assert_eq!(
        transition,
        Transition {
            from: R::Reset,
            event: E::Done,
            to: R::Collect,
            period_count: 1,
            version: 3,
        }
    );
    assert_eq!(driver.period_state().scalar(MOST_VOTED), None);
    assert_eq!(driver.round_count(), 3);
}

#[test_casing(3, [0, 1, 2])]
#[test]
fn timeout_discards_collection(collected: usize) {
    let ps = participants(4);
    let t0 = Instant::now();
    let mut driver = test_driver(4, t0);
    for p in &ps[..collected] {
        assert_eq!(driver.process_payload(observation(p, 7), t0).unwrap(), None);
    }

    let just_before = t0 + ROUND_TIMEOUT - Duration::from_millis(1);
    assert_eq!(driver.check_timeouts(just_before).unwrap(), None);
    assert_eq!(driver.current_round(), R::Collect);

    let t1 = t0 + ROUND_TIMEOUT;
    assert_eq!(
        driver.check_timeouts(t1).unwrap(),
        Some(Transition {
            from: R::Collect,
            event: E::RoundTimeout,
            to: R::Reset,
            period_count: 0,
            version: 0,
        })
    );
    // The period state is carried over untouched.
    assert_eq!(driver.period_state(), &initial_state(4));
    assert!(driver.round().collection().is_empty());
    assert_eq!(
        driver.next_deadline(),
        Some((t1 + ROUND_TIMEOUT, E::RoundTimeout))
    );
}

#[test]
fn late_payload_of_previous_round_is_rejected() {
    let ps = participants(4);
    let t0 = Instant::now();
    let mut driver = test_driver(4, t0);
    driver.check_timeouts(t0 + ROUND_TIMEOUT).unwrap().unwrap();
    assert_matches!(
        driver.process_payload(observation(&ps[0], 1), t0 + ROUND_TIMEOUT),
        Err(Error::Payload(PayloadError::InvalidPayload { round_id: "reset", .. }))
    );
}

#[test]
fn no_majority_loops_back() {
    let ps = participants(4);
    let t0 = Instant::now();
    let mut driver = test_driver(4, t0);
    for p in &ps[..3] {
        driver.deliver_payload(observation(p, 1)).unwrap();
    }
    driver.end_block(t0).unwrap().unwrap();
    let state = driver.period_state().clone();

    for (p, v) in ps.iter().zip(["a", "b", "a", "b"]) {
        driver.deliver_payload(vote(p, v)).unwrap();
    }
    let t1 = t0 + Duration::from_secs(5);
    let transition = driver.end_block(t1).unwrap().unwrap();
    assert_eq!(
        (transition.from, transition.event, transition.to),
        (R::Vote, E::NoMajority, R::Vote)
    );
    // Fresh instance with a new deadline, same state.
    assert!(driver.round().collection().is_empty());
    assert_eq!(driver.period_state(), &state);
    assert_eq!(
        driver.next_deadline(),
        Some((t1 + ROUND_TIMEOUT, E::RoundTimeout))
    );
    // Votes from the previous instance don't count as duplicates anymore.
    driver.deliver_payload(vote(&ps[0], "a")).unwrap();
}

#[test]
fn rejected_payloads_leave_the_round_untouched() {
    let ps = participants(4);
    let t0 = Instant::now();
    let mut driver = test_driver(4, t0);
    driver.deliver_payload(observation(&ps[0], 1)).unwrap();
    assert_matches!(
        driver.process_payload(observation(&ps[0], 2), t0),
        Err(Error::Payload(PayloadError::DuplicateSender { .. }))
    );
    assert_matches!(
        driver.deliver_payload(vote(&ps[1], "x")),
        Err(PayloadError::InvalidPayload { .. })
    );
    assert_eq!(driver.round().collection().len(), 1);
    assert_eq!(driver.round().collection()[&ps[0]].value, Value::Int(1));
}

#[test]
fn unknown_transition_is_fatal() {
    let ps = participants(4);
    let t0 = Instant::now();
    let mut driver = lying_driver(4, t0);
    for p in &ps[..2] {
        driver.deliver_payload(observation(p, 1)).unwrap();
    }
    assert_matches!(
        driver.process_payload(observation(&ps[2], 1), t0),
        Err(Error::Transition(TransitionError::UnknownTransition { round, event })) => {
            assert_eq!(round, "Collect");
            assert_eq!(event, "NoMajority");
        }
    );
    assert_eq!(driver.current_round(), R::Collect);
}

/// Random payloads for the active round, including duplicates and foreign senders.
fn random_payloads(rng: &mut impl rand::Rng, round: R, n: usize) -> Vec<Payload> {
    let mut ps = participants(n + 1);
    ps.shuffle(rng);
    ps.into_iter()
        .map(|p| match round {
            R::Collect => observation(&p, rng.gen_range(0..3)),
            R::Vote => vote(&p, ["x", "y"][rng.gen_range(0..2)]),
            R::Reset => reset(&p, rng.gen_range(1..3)),
        })
        .collect()
}

#[test]
fn replicas_agree() {
    let rng = &mut rand::rngs::StdRng::seed_from_u64(1234);
    let t0 = Instant::now();
    let mut replicas = [test_driver(4, t0), test_driver(4, t0)];
    let mut now = t0;
    for _ in 0..50 {
        now += Duration::from_secs(rng.gen_range(0..20));
        let payloads = random_payloads(rng, replicas[0].current_round(), 4);
        let mut transitions = vec![];
        for driver in &mut replicas {
            let mut got = vec![];
            for p in payloads.clone() {
                got.push(driver.process_payload(p, now).ok().flatten());
            }
            got.push(driver.check_timeouts(now).unwrap());
            transitions.push(got);
        }
        assert_eq!(transitions[0], transitions[1]);
        assert_eq!(replicas[0].current_round(), replicas[1].current_round());
        assert_eq!(
            replicas[0].period_state().encode().unwrap(),
            replicas[1].period_state().encode().unwrap()
        );
    }
    assert!(replicas[0].round_count() > 0);
}
