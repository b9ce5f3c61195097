//! Async surface of the driver.
use abci_engine::{Label, PayloadError, PeriodState, TransitionError};
use abci_roles::Payload;
use tokio::sync::{broadcast, mpsc, watch};

use crate::{Driver, Transition};

/// Input of a [`Runner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Payload to deliver to the active round.
    Payload(Payload),
    /// End of the current block: the active round gets evaluated.
    EndBlock,
}

/// Snapshot of the driver, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status<R> {
    /// Type of the active round.
    pub round: R,
    /// Period state the active round was activated with.
    pub period_state: PeriodState,
    /// Number of rounds activated after the initial one.
    pub round_count: u64,
}

/// Channels connecting a [`Runner`] to the rest of the node.
#[derive(Debug)]
pub struct Handle<R, E> {
    /// Inbound queue. Dropping every sender stops the runner.
    pub inbound: mpsc::Sender<Input>,
    /// Latest status.
    pub status: watch::Receiver<Status<R>>,
    /// Every transition, in order. Holds at most `capacity` undelivered transitions:
    /// a receiver falling further behind skips the oldest ones and gets
    /// [`broadcast::error::RecvError::Lagged`]. More receivers can be obtained with
    /// [`broadcast::Receiver::resubscribe`].
    pub transitions: broadcast::Receiver<Transition<R, E>>,
}

/// Owns a [`Driver`] on a single task. Payloads from any number of producers are
/// serialized through one queue; timeouts are driven by `tokio::time`.
#[derive(Debug)]
pub struct Runner<R, E> {
    driver: Driver<R, E>,
    inbound: mpsc::Receiver<Input>,
    status: watch::Sender<Status<R>>,
    transitions: broadcast::Sender<Transition<R, E>>,
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

impl<R: Label, E: Label> Runner<R, E> {
    /// Wraps `driver`, with inbound and transition queues of the given capacity.
    pub fn new(driver: Driver<R, E>, capacity: usize) -> (Self, Handle<R, E>) {
        let (inbound_send, inbound_recv) = mpsc::channel(capacity);
        let (status_send, status_recv) = watch::channel(status(&driver));
        let (transitions_send, transitions_recv) = broadcast::channel(capacity);
        (
            Self {
                driver,
                inbound: inbound_recv,
                status: status_send,
                transitions: transitions_send,
            },
            Handle {
                inbound: inbound_send,
                status: status_recv,
                transitions: transitions_recv,
            },
        )
    }

    /// Runs until the inbound queue is closed. Returns the driver on a clean shutdown,
    /// an error if the application can't move to the next round.
    pub async fn run(mut self) -> Result<Driver<R, E>, TransitionError> {
        loop {
            let input = match self.driver.next_deadline() {
                Some((at, _)) => {
                    tokio::select! {
                        input = self.inbound.recv() => input,
                        () = tokio::time::sleep_until(at.into()) => {
                            let res = self.driver.check_timeouts(now());
                            self.handle(res)?;
                            continue;
                        }
                    }
                }
                None => self.inbound.recv().await,
            };
            let Some(input) = input else {
                tracing::debug!("inbound queue closed, stopping");
                return Ok(self.driver);
            };
            match input {
                Input::Payload(payload) => {
                    if let Err(err) = self.driver.deliver_payload(payload) {
                        log_rejected(&err);
                    }
                }
                Input::EndBlock => {
                    let res = self.driver.end_block(now());
                    self.handle(res)?;
                }
            }
        }
    }

    fn handle(
        &mut self,
        res: Result<Option<Transition<R, E>>, TransitionError>,
    ) -> Result<(), TransitionError> {
        match res {
            Ok(None) => Ok(()),
            Ok(Some(transition)) => {
                self.status.send_replace(status(&self.driver));
                // Nobody listening to transitions is fine.
                let _ = self.transitions.send(transition);
                Ok(())
            }
            Err(err) => {
                tracing::error!(round = ?self.driver.current_round(), "{err}");
                Err(err)
            }
        }
    }
}

fn status<R: Label, E: Label>(driver: &Driver<R, E>) -> Status<R> {
    Status {
        round: driver.current_round(),
        period_state: driver.period_state().clone(),
        round_count: driver.round_count(),
    }
}

fn log_rejected(err: &PayloadError) {
    match err {
        PayloadError::DuplicateSender { .. } => tracing::debug!("dropped payload: {err}"),
        _ => tracing::warn!("dropped payload: {err}"),
    }
}
