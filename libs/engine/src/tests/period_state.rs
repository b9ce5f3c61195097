use abci_roles::{testonly::participants, Payload, Value};
use pretty_assertions::assert_eq;

use crate::{
    testonly::{initial_state, observation, MOST_VOTED, PARTICIPANT_TO_OBSERVATIONS},
    Collection, PeriodState, ScalarKey, Update,
};

const SAFE_CONTRACT_ADDRESS: ScalarKey = ScalarKey("safe_contract_address");

fn observations(n: usize) -> Collection {
    participants(n)
        .iter()
        .enumerate()
        .map(|(i, p)| (p.clone(), observation(p, i as i64)))
        .collect()
}

#[test]
fn update_layers_fields_without_touching_the_original() {
    let s0 = initial_state(4);
    let s1 = s0.update(Update::new().scalar(SAFE_CONTRACT_ADDRESS, "0xsafe"));
    let s2 = s1.update(
        Update::new()
            .scalar(MOST_VOTED, "x")
            .collection(PARTICIPANT_TO_OBSERVATIONS, observations(3)),
    );

    // Earlier versions are untouched.
    assert_eq!(s0.scalar(SAFE_CONTRACT_ADDRESS), None);
    assert_eq!(s1.scalar(MOST_VOTED), None);
    assert_eq!(s1.collection(PARTICIPANT_TO_OBSERVATIONS), None);

    // Later rounds read the fields set by earlier ones.
    assert_eq!(
        s2.scalar(SAFE_CONTRACT_ADDRESS),
        Some(&Value::Text("0xsafe".into()))
    );
    assert_eq!(s2.scalar(MOST_VOTED), Some(&Value::Text("x".into())));
    assert_eq!(s2.collection(PARTICIPANT_TO_OBSERVATIONS).unwrap().len(), 3);

    assert_eq!((s0.version(), s1.version(), s2.version()), (0, 1, 2));
    assert_eq!(s2.participants(), s0.participants());
    assert_eq!(
        s2.field_names().collect::<Vec<_>>(),
        vec!["most_voted", "safe_contract_address", "participant_to_observations"]
    );
}

#[test]
fn update_overwrites_a_field() {
    let s1 = initial_state(2).update(Update::new().scalar(MOST_VOTED, 1i64));
    let s2 = s1.update(Update::new().scalar(MOST_VOTED, 2i64));
    assert_eq!(s1.scalar(MOST_VOTED), Some(&Value::Int(1)));
    assert_eq!(s2.scalar(MOST_VOTED), Some(&Value::Int(2)));
}

#[test]
fn update_replaces_participants() {
    let s0 = PeriodState::new([]);
    let s1 = s0.update(Update::new().participants(participants(3)));
    assert!(s0.participants().is_empty());
    assert_eq!(s1.participants().len(), 3);
    assert!(s1.is_participant(&participants(3)[2]));
}

#[test]
fn reset_starts_a_new_period() {
    let s1 = initial_state(4).update(
        Update::new()
            .scalar(SAFE_CONTRACT_ADDRESS, "0xsafe")
            .collection(PARTICIPANT_TO_OBSERVATIONS, observations(4)),
    );
    let s2 = s1.reset(1);
    assert_eq!(s2.period_count(), 1);
    assert_eq!(s2.participants(), s1.participants());
    assert_eq!(s2.field_names().count(), 0);
    assert_eq!(s2.version(), s1.version() + 1);
    assert_eq!(s1.field_names().count(), 2);
}

#[test]
fn reset_keeping_carries_scalars_over() {
    let s1 = initial_state(4).update(
        Update::new()
            .scalar(SAFE_CONTRACT_ADDRESS, "0xsafe")
            .scalar(MOST_VOTED, "x")
            .collection(PARTICIPANT_TO_OBSERVATIONS, observations(4)),
    );
    let s2 = s1.reset_keeping(3, &[SAFE_CONTRACT_ADDRESS]);
    assert_eq!(s2.period_count(), 3);
    assert_eq!(s2.field_names().collect::<Vec<_>>(), vec!["safe_contract_address"]);
    assert_eq!(s2.scalar(SAFE_CONTRACT_ADDRESS), Some(&Value::from("0xsafe")));
}

#[test]
fn collection_holds_one_entry_per_participant() {
    let ps = participants(2);
    let mut c = Collection::new();
    c.insert(ps[0].clone(), observation(&ps[0], 1));
    c.insert(ps[0].clone(), observation(&ps[0], 2));
    c.insert(ps[1].clone(), Payload::new(ps[1].clone(), crate::testonly::VOTE, "x"));
    assert_eq!(c.len(), 2);
}

#[test]
fn encoding_is_canonical() {
    let ps = participants(4);
    let a = PeriodState::new(ps.iter().cloned()).update(
        Update::new()
            .scalar(MOST_VOTED, "x")
            .scalar(SAFE_CONTRACT_ADDRESS, "0xsafe")
            .collection(PARTICIPANT_TO_OBSERVATIONS, observations(4)),
    );
    // Same content, built in a different order.
    let b = PeriodState::new(ps.iter().rev().cloned()).update(
        Update::new()
            .collection(
                PARTICIPANT_TO_OBSERVATIONS,
                observations(4)
                    .into_iter()
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect(),
            )
            .scalar(SAFE_CONTRACT_ADDRESS, "0xsafe")
            .scalar(MOST_VOTED, "x"),
    );
    assert_eq!(a, b);
    assert_eq!(a.encode().unwrap(), b.encode().unwrap());

    let c = a.update(Update::new());
    assert_ne!(a.encode().unwrap(), c.encode().unwrap());
}
