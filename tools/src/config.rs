//! Simulator configuration.
use std::{collections::BTreeSet, fs, net::SocketAddr, path::Path};

use abci_roles::ParticipantId;
use anyhow::Context as _;

/// Decodes a value from json, rejecting trailing input.
pub fn decode_json<T: serde::de::DeserializeOwned>(json: &str) -> anyhow::Result<T> {
    let mut d = serde_json::Deserializer::from_str(json);
    let p = T::deserialize(&mut d)?;
    d.end()?;
    Ok(p)
}

fn default_max_rounds() -> u64 {
    1000
}

/// Configuration of a simulation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimulatorConfig {
    /// Participants and the initial period.
    #[serde(flatten)]
    pub app: abci_driver::Config,
    /// Number of periods to complete.
    pub periods: u64,
    /// Seed of the payload shuffling.
    #[serde(default)]
    pub seed: u64,
    /// Participants that never send anything.
    #[serde(default)]
    pub offline: Vec<ParticipantId>,
    /// Upper bound on the number of rounds, so that a stalled application terminates.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u64,
    /// Address to expose the metrics on.
    #[serde(default)]
    pub metrics_server_addr: Option<SocketAddr>,
}

impl SimulatorConfig {
    /// Reads and validates a config file.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path).with_context(|| path.display().to_string())?;
        let cfg: Self = decode_json(&json).context("decode_json()")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the consistency of the config.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.app.validate().context("app")?;
        anyhow::ensure!(self.periods > 0, "periods has to be positive");
        let participants: BTreeSet<_> = self.app.participants.iter().collect();
        if let Some(p) = self.offline.iter().find(|p| !participants.contains(p)) {
            anyhow::bail!("offline {p:?} isn't a participant");
        }
        Ok(())
    }
}
