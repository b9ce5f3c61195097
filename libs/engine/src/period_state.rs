//! Period state: the immutable record of agreement results replicated across participants.
use std::fmt;

use abci_roles::{ParticipantId, Payload, Value};
use anyhow::Context as _;

/// Payloads collected in a round, at most one per participant.
pub type Collection = im::OrdMap<ParticipantId, Payload>;

/// Key of a scalar field of the period state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScalarKey(pub &'static str);

/// Key of a collection field of the period state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionKey(pub &'static str);

/// State of the current period.
///
/// A `PeriodState` is never mutated: [`PeriodState::update`] and [`PeriodState::reset`]
/// return a new version, leaving the original untouched. All maps are persistent
/// and ordered, so copies share structure and the encoding is canonical.
#[derive(Clone, PartialEq, Eq, serde::Serialize)]
pub struct PeriodState {
    participants: im::OrdSet<ParticipantId>,
    period_count: u64,
    version: u64,
    scalars: im::OrdMap<&'static str, Value>,
    collections: im::OrdMap<&'static str, Collection>,
}

impl fmt::Debug for PeriodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodState")
            .field("participants", &self.participants.len())
            .field("period_count", &self.period_count)
            .field("version", &self.version)
            .field("scalars", &self.scalars)
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PeriodState {
    /// State at the start of the first period.
    pub fn new(participants: impl IntoIterator<Item = ParticipantId>) -> Self {
        Self {
            participants: participants.into_iter().collect(),
            period_count: 0,
            version: 0,
            scalars: im::OrdMap::new(),
            collections: im::OrdMap::new(),
        }
    }

    /// Same as `new`, but starting at the given period.
    pub fn with_period_count(
        participants: impl IntoIterator<Item = ParticipantId>,
        period_count: u64,
    ) -> Self {
        Self {
            period_count,
            ..Self::new(participants)
        }
    }

    /// Participants of the period.
    pub fn participants(&self) -> &im::OrdSet<ParticipantId> {
        &self.participants
    }

    /// Whether `id` is a participant of the period.
    pub fn is_participant(&self, id: &ParticipantId) -> bool {
        self.participants.contains(id)
    }

    /// Number of the current period.
    pub fn period_count(&self) -> u64 {
        self.period_count
    }

    /// Number of updates applied to this period state since it was created.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Reads a scalar field.
    pub fn scalar(&self, key: ScalarKey) -> Option<&Value> {
        self.scalars.get(key.0)
    }

    /// Reads a collection field.
    pub fn collection(&self, key: CollectionKey) -> Option<&Collection> {
        self.collections.get(key.0)
    }

    /// Names of the fields that are set, scalars first.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.scalars
            .keys()
            .copied()
            .chain(self.collections.keys().copied())
    }

    /// Returns a new version of the state with `update` layered on top.
    /// Fields not mentioned by `update` are preserved.
    pub fn update(&self, update: Update) -> Self {
        let mut next = self.clone();
        if let Some(participants) = update.participants {
            next.participants = participants;
        }
        for (key, value) in update.scalars {
            next.scalars.insert(key.0, value);
        }
        for (key, collection) in update.collections {
            next.collections.insert(key.0, collection);
        }
        next.version += 1;
        next
    }

    /// Starts a new period: keeps the participants, sets `period_count`
    /// and drops every other field.
    pub fn reset(&self, period_count: u64) -> Self {
        self.reset_keeping(period_count, &[])
    }

    /// Same as `reset`, but carries the `keep` scalars over into the new period.
    pub fn reset_keeping(&self, period_count: u64, keep: &[ScalarKey]) -> Self {
        Self {
            participants: self.participants.clone(),
            period_count,
            version: self.version + 1,
            scalars: self
                .scalars
                .iter()
                .filter(|(k, _)| keep.iter().any(|key| key.0 == **k))
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            collections: im::OrdMap::new(),
        }
    }

    /// Canonical encoding of the state. Replicas which agree on the state
    /// produce byte-identical encodings.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(self).context("serde_json::to_vec()")
    }
}

/// A set of fields to layer on top of a [`PeriodState`].
#[derive(Debug, Clone, Default)]
pub struct Update {
    participants: Option<im::OrdSet<ParticipantId>>,
    scalars: Vec<(ScalarKey, Value)>,
    collections: Vec<(CollectionKey, Collection)>,
}

impl Update {
    /// Empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a scalar field.
    pub fn scalar(mut self, key: ScalarKey, value: impl Into<Value>) -> Self {
        self.scalars.push((key, value.into()));
        self
    }

    /// Sets a collection field.
    pub fn collection(mut self, key: CollectionKey, collection: Collection) -> Self {
        self.collections.push((key, collection));
        self
    }

    /// Replaces the participant set.
    pub fn participants(mut self, participants: impl IntoIterator<Item = ParticipantId>) -> Self {
        self.participants = Some(participants.into_iter().collect());
        self
    }
}
