//! Runtime configuration of the driver.
use std::collections::BTreeSet;

use abci_engine::PeriodState;
use abci_roles::ParticipantId;

/// Configuration of a replica. The transition function itself is static
/// and isn't part of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Participants of the application.
    pub participants: Vec<ParticipantId>,
    /// Period to start from.
    #[serde(default)]
    pub period_count: u64,
}

impl Config {
    /// Checks that the participant set is non-empty and free of duplicates.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.participants.is_empty(), "no participants");
        let unique: BTreeSet<_> = self.participants.iter().collect();
        anyhow::ensure!(
            unique.len() == self.participants.len(),
            "duplicate participants"
        );
        Ok(())
    }

    /// Period state the application starts with.
    pub fn initial_state(&self) -> PeriodState {
        PeriodState::with_period_count(self.participants.iter().cloned(), self.period_count)
    }
}
