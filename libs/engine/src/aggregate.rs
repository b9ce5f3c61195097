//! Reusable aggregation strategies.
use abci_roles::Value;

use crate::{
    period_state::{CollectionKey, PeriodState, ScalarKey, Update},
    round::{Aggregate, Outcome},
};

/// Stores the whole collection under `collection` and concludes with `event`.
#[derive(Debug, Clone)]
pub struct CollectDistinct<E> {
    /// Field receiving the collection.
    pub collection: CollectionKey,
    /// Event emitted on completion.
    pub event: E,
}

impl<E: Copy + Send + Sync + std::fmt::Debug> Aggregate<E> for CollectDistinct<E> {
    fn events(&self) -> Vec<E> {
        vec![self.event]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, E) {
        let update = Update::new().collection(self.collection, outcome.collection().clone());
        (state.update(update), self.event)
    }
}

/// Stores the collection under `collection` and the agreed value under `scalar`.
#[derive(Debug, Clone)]
pub struct MostVoted<E> {
    /// Field receiving the collection.
    pub collection: CollectionKey,
    /// Field receiving the most voted value.
    pub scalar: ScalarKey,
    /// Event emitted on completion.
    pub event: E,
}

impl<E: Copy + Send + Sync + std::fmt::Debug> Aggregate<E> for MostVoted<E> {
    fn events(&self) -> Vec<E> {
        vec![self.event]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, E) {
        let mut update = Update::new().collection(self.collection, outcome.collection().clone());
        if let Outcome::Agreed { value, .. } = outcome {
            update = update.scalar(self.scalar, value.clone());
        }
        (state.update(update), self.event)
    }
}

/// Starts a new period numbered by the agreed value. Period numbers only grow:
/// an agreed value not above the current period falls back to the next period.
#[derive(Debug, Clone)]
pub struct ResetPeriod<E> {
    /// Scalars outliving the period.
    pub keep: &'static [ScalarKey],
    /// Event emitted on completion.
    pub event: E,
}

impl<E: Copy + Send + Sync + std::fmt::Debug> Aggregate<E> for ResetPeriod<E> {
    fn events(&self) -> Vec<E> {
        vec![self.event]
    }

    fn aggregate(&self, state: &PeriodState, outcome: Outcome<'_>) -> (PeriodState, E) {
        let period_count = match outcome {
            Outcome::Agreed {
                value: Value::Int(count),
                ..
            } => u64::try_from(*count)
                .ok()
                .filter(|count| *count > state.period_count()),
            _ => None,
        };
        let period_count = period_count
            .or_else(|| state.period_count().checked_add(1))
            .unwrap_or(u64::MAX);
        (state.reset_keeping(period_count, self.keep), self.event)
    }
}
