//! Deterministic simulation of replicas running the APY estimation application.
use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

use abci_apy_estimation::{app, behaviour::honest_payload, Event, Round};
use abci_driver::{Driver, Transition};
use abci_roles::{ParticipantId, Payload};
use anyhow::Context as _;
use rand::{seq::SliceRandom as _, SeedableRng as _};

use crate::SimulatorConfig;

/// Summary of a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Number of round transitions.
    pub rounds: u64,
    /// Number of transitions forced by a timeout.
    pub timeouts: u64,
    /// Number of completed periods.
    pub periods: u64,
    /// Simulated time elapsed.
    pub elapsed: Duration,
    /// Canonical encoding of the final period state, identical on every replica.
    pub state: Vec<u8>,
}

/// Replicas of the application fed with identical inputs.
///
/// Every round, each online participant submits its honest payload; all replicas receive
/// them in the same shuffled order. A round that doesn't conclude is timed out by jumping
/// the simulated clock to its next deadline. After every step the replicas are checked
/// to agree on the transition and on the encoded period state.
#[derive(Debug)]
pub struct Simulator {
    cfg: SimulatorConfig,
    replicas: Vec<Driver<Round, Event>>,
    online: Vec<ParticipantId>,
    rng: rand::rngs::StdRng,
    start: Instant,
    now: Instant,
}

impl Simulator {
    /// Constructs `replicas` replicas of the application.
    pub fn new(cfg: SimulatorConfig, replicas: usize) -> anyhow::Result<Self> {
        cfg.validate()?;
        anyhow::ensure!(replicas > 0, "at least one replica is required");
        let app = Arc::new(app().context("app()")?);
        let now = Instant::now();
        let replicas = (0..replicas)
            .map(|_| Driver::new(app.clone(), cfg.app.initial_state(), now))
            .collect::<Result<_, _>>()
            .context("Driver::new()")?;
        let offline: BTreeSet<_> = cfg.offline.iter().collect();
        let online = cfg
            .app
            .participants
            .iter()
            .filter(|p| !offline.contains(p))
            .cloned()
            .collect();
        Ok(Self {
            rng: rand::rngs::StdRng::seed_from_u64(cfg.seed),
            cfg,
            replicas,
            online,
            start: now,
            now,
        })
    }

    fn payloads(&mut self) -> Vec<Payload> {
        let leader = &self.replicas[0];
        let round = leader.current_round();
        let state = leader.period_state();
        let mut payloads: Vec<_> = self
            .online
            .iter()
            .filter_map(|p| honest_payload(round, state, p))
            .collect();
        payloads.shuffle(&mut self.rng);
        payloads
    }

    /// Executes one round on every replica.
    fn step(&mut self) -> anyhow::Result<Transition<Round, Event>> {
        let payloads = self.payloads();
        let mut transitions = vec![];
        for (i, driver) in self.replicas.iter_mut().enumerate() {
            for payload in &payloads {
                if let Err(err) = driver.deliver_payload(payload.clone()) {
                    tracing::debug!(replica = i, "dropped payload: {err}");
                }
            }
            transitions.push(driver.end_block(self.now)?);
        }
        if transitions[0].is_none() {
            let (deadline, _) = self.replicas[0]
                .next_deadline()
                .context("round without a deadline")?;
            self.now = self.now.max(deadline);
            transitions = self
                .replicas
                .iter_mut()
                .map(|d| d.check_timeouts(self.now))
                .collect::<Result<_, _>>()?;
        }

        let first = transitions[0].clone().context("round didn't conclude")?;
        let state = self.replicas[0].period_state().encode()?;
        for (i, (t, driver)) in transitions.iter().zip(&self.replicas).enumerate().skip(1) {
            anyhow::ensure!(
                t.as_ref() == Some(&first),
                "replica {i} diverged: {t:?} != {first:?}"
            );
            anyhow::ensure!(
                driver.period_state().encode()? == state,
                "replica {i} diverged after {first:?}"
            );
        }
        Ok(first)
    }

    /// Runs until the configured number of periods is completed or the round limit is hit.
    pub fn run(mut self) -> anyhow::Result<Report> {
        let target = self.cfg.app.period_count.saturating_add(self.cfg.periods);
        let mut rounds = 0;
        let mut timeouts = 0;
        while self.replicas[0].period_state().period_count() < target {
            if rounds >= self.cfg.max_rounds {
                tracing::warn!(rounds, "round limit reached");
                break;
            }
            let t = self.step()?;
            rounds += 1;
            if matches!(
                t.event,
                Event::RoundTimeout
                    | Event::ValidateTimeout
                    | Event::DeployTimeout
                    | Event::ResetTimeout
            ) {
                timeouts += 1;
            }
        }
        let state = self.replicas[0].period_state();
        Ok(Report {
            rounds,
            timeouts,
            periods: state.period_count().saturating_sub(self.cfg.app.period_count),
            elapsed: self.now - self.start,
            state: state.encode()?,
        })
    }
}
