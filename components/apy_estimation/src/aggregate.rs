//! Aggregation strategies specific to the application.
use std::collections::BTreeMap;

use abci_engine::{Aggregate, CollectionKey, Outcome, PeriodState, ScalarKey, Update};
use abci_roles::{ParticipantId, Value};

use crate::{
    app::Event,
    keys::{
        MOST_VOTED_KEEPER_ADDRESS, ORACLE_CONTRACT_ADDRESS, PARTICIPANT_TO_VOTES,
        SAFE_CONTRACT_ADDRESS, TRANSFORMATION,
    },
    transform::transform,
};

fn is_keeper(state: &PeriodState, sender: &ParticipantId) -> bool {
    state
        .scalar(MOST_VOTED_KEEPER_ADDRESS)
        .and_then(Value::as_text)
        .is_some_and(|keeper| keeper == sender.as_str())
}

/// Sets the participants of the period to the registered senders.
///
/// Concludes with `FastForward` if both contracts are already deployed,
/// so that the setup rounds are skipped.
#[derive(Debug, Clone, Copy)]
pub struct Registration;

impl Aggregate<Event> for Registration {
    fn events(&self) -> Vec<Event> {
        vec![Event::Done, Event::FastForward]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, Event) {
        let registered = outcome.collection().keys().cloned();
        let next = state.update(Update::new().participants(registered));
        let deployed = state.scalar(SAFE_CONTRACT_ADDRESS).is_some()
            && state.scalar(ORACLE_CONTRACT_ADDRESS).is_some();
        let event = if deployed {
            tracing::debug!("contracts already deployed, skipping setup");
            Event::FastForward
        } else {
            Event::Done
        };
        (next, event)
    }
}

/// Accepts a single payload from the elected keeper and stores it under `scalar`.
#[derive(Debug, Clone, Copy)]
pub struct KeeperOnly {
    /// Field receiving the keeper's contribution.
    pub scalar: ScalarKey,
}

impl Aggregate<Event> for KeeperOnly {
    fn events(&self) -> Vec<Event> {
        vec![Event::Done]
    }

    fn accepts_sender(&self, state: &PeriodState, sender: &ParticipantId) -> bool {
        is_keeper(state, sender)
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, Event) {
        let mut update = Update::new();
        if let Outcome::Collected { values, .. } = &outcome {
            if let Some(value) = values.first() {
                update = update.scalar(self.scalar, (*value).clone());
            }
        }
        (state.update(update), Event::Done)
    }
}

/// Outcome of a validation vote: `true` is `Done`, `false` is `Negative`
/// and `null` (validation couldn't be performed) is `None`.
#[derive(Debug, Clone, Copy)]
pub struct ValidateVote;

impl Aggregate<Event> for ValidateVote {
    fn events(&self) -> Vec<Event> {
        vec![Event::Done, Event::Negative, Event::None]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, Event) {
        let next =
            state.update(Update::new().collection(PARTICIPANT_TO_VOTES, outcome.collection().clone()));
        let event = match outcome {
            Outcome::Agreed {
                value: Value::Bool(true),
                ..
            } => Event::Done,
            Outcome::Agreed {
                value: Value::Bool(false),
                ..
            } => Event::Negative,
            _ => Event::None,
        };
        (next, event)
    }
}

/// Stores the collection under `collection` and its canonical form under `transformation`.
#[derive(Debug, Clone, Copy)]
pub struct CollectAndTransform {
    /// Field receiving the collection.
    pub collection: CollectionKey,
}

impl Aggregate<Event> for CollectAndTransform {
    fn events(&self) -> Vec<Event> {
        vec![Event::Done]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, Event) {
        let Outcome::Collected { collection, values } = outcome else {
            return (state.clone(), Event::Done);
        };
        let update = Update::new()
            .collection(self.collection, collection.clone())
            .scalar(TRANSFORMATION, transform(values));
        (state.update(update), Event::Done)
    }
}

/// Stores the collection under `collection` and adopts the most submitted
/// transformation, in canonical form. Ties go to the smallest one.
///
/// Participants resubmit the transformation they hold, so merging the submissions
/// would multiply it by the number of participants.
#[derive(Debug, Clone, Copy)]
pub struct AdoptTransformation {
    /// Field receiving the collection.
    pub collection: CollectionKey,
}

impl Aggregate<Event> for AdoptTransformation {
    fn events(&self) -> Vec<Event> {
        vec![Event::Done]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, Event) {
        let Outcome::Collected { collection, values } = outcome else {
            return (state.clone(), Event::Done);
        };
        let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
        for value in values {
            *counts.entry(value).or_default() += 1;
        }
        let mut adopted: Option<(&Value, usize)> = None;
        for (value, count) in counts {
            if adopted.map_or(true, |(_, c)| count > c) {
                adopted = Some((value, count));
            }
        }
        let mut update = Update::new().collection(self.collection, collection.clone());
        if let Some((value, _)) = adopted {
            update = update.scalar(TRANSFORMATION, transform([value]));
        }
        (state.update(update), Event::Done)
    }
}

/// Keeper reports the hash of the settlement transaction it sent,
/// or `null` if sending failed.
#[derive(Debug, Clone, Copy)]
pub struct Finalize {
    /// Field receiving the transaction hash.
    pub scalar: ScalarKey,
}

impl Aggregate<Event> for Finalize {
    fn events(&self) -> Vec<Event> {
        vec![Event::Done, Event::Failed]
    }

    fn accepts_sender(&self, state: &PeriodState, sender: &ParticipantId) -> bool {
        is_keeper(state, sender)
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, Event) {
        let hash = match &outcome {
            Outcome::Collected { values, .. } => values.first().filter(|v| !v.is_null()),
            Outcome::Agreed { value, .. } => Some(value).filter(|v| !v.is_null()),
        };
        match hash {
            Some(hash) => (
                state.update(Update::new().scalar(self.scalar, (*hash).clone())),
                Event::Done,
            ),
            None => (state.clone(), Event::Failed),
        }
    }
}
