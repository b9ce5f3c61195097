//! Single-threaded state machine moving an application from round to round.
use std::{sync::Arc, time::Instant};

use abci_engine::{AbciApp, CollectionRound, Label, PayloadError, PeriodState, TransitionError};
use abci_roles::Payload;

use crate::metrics::{RejectionLabels, TransitionLabels, METRICS};

/// Errors that can occur while driving an application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The active round rejected a payload. Not fatal: the payload is dropped.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// The application can't move to the next round. Fatal.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Record of a round transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<R, E> {
    /// Round that concluded.
    pub from: R,
    /// Event it concluded with.
    pub event: E,
    /// Round that was activated.
    pub to: R,
    /// Period of the state the new round was activated with.
    pub period_count: u64,
    /// Version of the state the new round was activated with.
    pub version: u64,
}

/// A pending timeout of the active round.
#[derive(Debug, Clone, Copy)]
struct Deadline<E> {
    at: Instant,
    event: E,
}

/// Drives an [`AbciApp`]: delivers payloads to the active round, evaluates it at the end
/// of every block and moves to the next round, either on completion or on timeout.
///
/// The driver never reads the clock; the caller passes the current time explicitly,
/// which keeps every replica's behaviour a function of its inputs.
#[derive(Debug)]
pub struct Driver<R, E> {
    app: Arc<AbciApp<R, E>>,
    current_round: R,
    round: CollectionRound<E>,
    /// Sorted by time, then by event.
    deadlines: Vec<Deadline<E>>,
    entered_at: Instant,
    round_count: u64,
}

impl<R: Label, E: Label> Driver<R, E> {
    /// Activates the initial round of `app` with `initial_state`.
    pub fn new(
        app: Arc<AbciApp<R, E>>,
        initial_state: PeriodState,
        now: Instant,
    ) -> Result<Self, TransitionError> {
        let current_round = app.initial_round();
        let round = app.new_round(current_round, initial_state)?;
        let mut this = Self {
            app,
            current_round,
            round,
            deadlines: vec![],
            entered_at: now,
            round_count: 0,
        };
        this.schedule_deadlines(now);
        METRICS.period_count.set(this.period_state().period_count());
        Ok(this)
    }

    /// Application driven.
    pub fn app(&self) -> &Arc<AbciApp<R, E>> {
        &self.app
    }

    /// Type of the active round.
    pub fn current_round(&self) -> R {
        self.current_round
    }

    /// The active round.
    pub fn round(&self) -> &CollectionRound<E> {
        &self.round
    }

    /// Period state the active round was activated with.
    pub fn period_state(&self) -> &PeriodState {
        self.round.period_state()
    }

    /// Number of rounds activated after the initial one.
    pub fn round_count(&self) -> u64 {
        self.round_count
    }

    /// Delivers a payload to the active round.
    pub fn deliver_payload(&mut self, payload: Payload) -> Result<(), PayloadError> {
        let sender = payload.sender.clone();
        if let Err(err) = self.round.process_payload(payload) {
            METRICS.rejected_payloads[&RejectionLabels {
                reason: (&err).into(),
            }]
                .inc();
            return Err(err);
        }
        tracing::debug!(
            round = self.round.round_id(),
            %sender,
            collected = self.round.collection().len(),
            "accepted payload"
        );
        Ok(())
    }

    /// Evaluates the active round and moves to the next one if it concluded.
    pub fn end_block(
        &mut self,
        now: Instant,
    ) -> Result<Option<Transition<R, E>>, TransitionError> {
        let Some((state, event)) = self.round.end_block() else {
            return Ok(None);
        };
        self.transition(event, state, now).map(Some)
    }

    /// Delivers a payload and ends the block.
    pub fn process_payload(
        &mut self,
        payload: Payload,
        now: Instant,
    ) -> Result<Option<Transition<R, E>>, Error> {
        self.deliver_payload(payload)?;
        Ok(self.end_block(now)?)
    }

    /// Earliest pending deadline of the active round with its timeout event.
    pub fn next_deadline(&self) -> Option<(Instant, E)> {
        self.deadlines.first().map(|d| (d.at, d.event))
    }

    /// Fires the earliest deadline if it has passed. The round's collection is discarded
    /// and the next round is activated with the unchanged period state.
    pub fn check_timeouts(
        &mut self,
        now: Instant,
    ) -> Result<Option<Transition<R, E>>, TransitionError> {
        let Some((at, event)) = self.next_deadline() else {
            return Ok(None);
        };
        if at > now {
            return Ok(None);
        }
        tracing::debug!(
            round = self.round.round_id(),
            ?event,
            collected = self.round.collection().len(),
            "round timed out"
        );
        METRICS.round_timeouts.inc();
        let state = self.period_state().clone();
        self.transition(event, state, now).map(Some)
    }

    fn transition(
        &mut self,
        event: E,
        state: PeriodState,
        now: Instant,
    ) -> Result<Transition<R, E>, TransitionError> {
        let from = self.current_round;
        let to = self.app.next_round(from, event)?;
        let round = self.app.new_round(to, state)?;

        METRICS.round_transitions[&TransitionLabels {
            round: format!("{from:?}"),
            event: format!("{event:?}"),
        }]
            .inc();
        METRICS
            .round_latency
            .observe(now.saturating_duration_since(self.entered_at));

        self.current_round = to;
        self.round = round;
        self.entered_at = now;
        self.round_count += 1;
        self.schedule_deadlines(now);

        let transition = Transition {
            from,
            event,
            to,
            period_count: self.period_state().period_count(),
            version: self.period_state().version(),
        };
        METRICS.period_count.set(transition.period_count);
        tracing::info!(
            from = ?transition.from,
            event = ?transition.event,
            to = ?transition.to,
            period_count = transition.period_count,
            version = transition.version,
            "round transition"
        );
        Ok(transition)
    }

    /// Replaces the deadlines of the previous round with those of the active one.
    fn schedule_deadlines(&mut self, now: Instant) {
        self.deadlines = self
            .app
            .round_timeouts(self.current_round)
            .into_iter()
            .map(|(event, timeout)| Deadline {
                at: now + timeout,
                event,
            })
            .collect();
        self.deadlines
            .sort_by(|a, b| a.at.cmp(&b.at).then(a.event.cmp(&b.event)));
        if let Some(d) = self.deadlines.first() {
            tracing::debug!(
                round = self.round.round_id(),
                event = ?d.event,
                timeout = ?d.at.saturating_duration_since(now),
                "scheduled deadline"
            );
        }
    }
}
