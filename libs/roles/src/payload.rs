use std::{borrow::Cow, fmt};

use crate::{ParticipantId, Value};

/// Tag identifying which kind of round a payload belongs to.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TransactionType(Cow<'static, str>);

impl TransactionType {
    /// Creates a transaction type from a static tag.
    pub const fn new(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// The tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single participant's contribution to a round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Payload {
    /// Participant which sent the payload.
    pub sender: ParticipantId,
    /// Kind of round this payload is meant for.
    pub tx_type: TransactionType,
    /// Round-specific content.
    pub value: Value,
}

impl Payload {
    /// Creates a new payload.
    pub fn new(sender: ParticipantId, tx_type: TransactionType, value: impl Into<Value>) -> Self {
        Self {
            sender,
            tx_type,
            value: value.into(),
        }
    }
}
