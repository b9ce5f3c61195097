//! Transition function of a round-based application.
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    sync::Arc,
    time::Duration,
};

use crate::{
    period_state::PeriodState,
    round::{CollectionRound, RoundSpec, Threshold},
};

/// Bounds required from round type and event identifiers.
pub trait Label: Copy + Ord + fmt::Debug + Send + Sync + 'static {}

impl<T: Copy + Ord + fmt::Debug + Send + Sync + 'static> Label for T {}

/// Static mapping `(round type, event) -> next round type`.
pub type TransitionFunction<R, E> = BTreeMap<R, BTreeMap<E, R>>;

/// Errors detected while validating an application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Initial round isn't a known round type.
    #[error("initial round {round} is unknown")]
    UnknownInitialRound {
        /// Initial round.
        round: String,
    },
    /// Round type appears in the transition function, but has no spec.
    #[error("round {round} has no round spec")]
    MissingRoundSpec {
        /// Round type.
        round: String,
    },
    /// Round type has a spec, but no entry in the transition function.
    #[error("round {round} has no transitions")]
    MissingTransitions {
        /// Round type.
        round: String,
    },
    /// A transition leads to an unknown round type.
    #[error("transition {round} --{event}--> {target} leads to an unknown round")]
    UnknownTarget {
        /// Source round type.
        round: String,
        /// Event triggering the transition.
        event: String,
        /// Target round type.
        target: String,
    },
    /// A round can emit an event which has no transition.
    #[error("round {round} can emit {event}, which has no transition")]
    MissingTransition {
        /// Round type.
        round: String,
        /// Unhandled event.
        event: String,
    },
    /// A round type can't be reached from the initial round.
    #[error("round {round} is unreachable from the initial round")]
    UnreachableRound {
        /// Round type.
        round: String,
    },
    /// A round type has no timeout event, so it could wait for a quorum forever.
    #[error("round {round} has no timeout transition")]
    NoTimeout {
        /// Round type.
        round: String,
    },
    /// A round would conclude without a single contribution.
    #[error("round {round} has a zero threshold")]
    ZeroThreshold {
        /// Round type.
        round: String,
    },
    /// A timeout has zero duration.
    #[error("timeout of {event} has zero duration")]
    ZeroTimeout {
        /// Timeout event.
        event: String,
    },
}

/// Errors that can occur when moving between rounds.
/// These are configuration defects and should be treated as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The transition function has no entry for the emitted event.
    #[error("unknown transition: round {round} has no entry for {event}")]
    UnknownTransition {
        /// Round type.
        round: String,
        /// Emitted event.
        event: String,
    },
    /// Round type isn't part of the application.
    #[error("unknown round {round}")]
    UnknownRound {
        /// Round type.
        round: String,
    },
}

fn label(x: impl fmt::Debug) -> String {
    format!("{x:?}")
}

/// A round-based application: round types, the transition function between them,
/// and the timeouts of the timeout events.
///
/// Constructed once and never modified; [`AbciApp::new`] validates that the
/// state machine is total, connected and live.
#[derive(Debug)]
pub struct AbciApp<R, E> {
    initial_round: R,
    rounds: BTreeMap<R, Arc<RoundSpec<E>>>,
    transition_function: TransitionFunction<R, E>,
    event_to_timeout: BTreeMap<E, Duration>,
}

impl<R: Label, E: Label> AbciApp<R, E> {
    /// Validates and constructs the application.
    ///
    /// Checks that:
    /// * every round type has both a spec and a row in the transition function,
    /// * every transition leads to a known round type,
    /// * every event a round can emit has a transition,
    /// * every round type is reachable from `initial_round`,
    /// * no round type has a zero threshold,
    /// * every round type has at least one timeout transition,
    /// * no timeout is zero.
    pub fn new(
        initial_round: R,
        rounds: impl IntoIterator<Item = (R, RoundSpec<E>)>,
        transition_function: TransitionFunction<R, E>,
        event_to_timeout: BTreeMap<E, Duration>,
    ) -> Result<Self, ConfigError> {
        let rounds: BTreeMap<R, Arc<RoundSpec<E>>> = rounds
            .into_iter()
            .map(|(round, spec)| (round, Arc::new(spec)))
            .collect();

        if !rounds.contains_key(&initial_round) {
            return Err(ConfigError::UnknownInitialRound {
                round: label(initial_round),
            });
        }
        if let Some(round) = transition_function
            .keys()
            .find(|r| !rounds.contains_key(*r))
        {
            return Err(ConfigError::MissingRoundSpec {
                round: label(round),
            });
        }
        if let Some(round) = rounds
            .keys()
            .find(|r| !transition_function.contains_key(*r))
        {
            return Err(ConfigError::MissingTransitions {
                round: label(round),
            });
        }
        for (round, row) in &transition_function {
            for (event, target) in row {
                if !rounds.contains_key(target) {
                    return Err(ConfigError::UnknownTarget {
                        round: label(round),
                        event: label(event),
                        target: label(target),
                    });
                }
            }
        }
        for (round, spec) in &rounds {
            let row = &transition_function[round];
            if let Some(event) = spec
                .emitted_events()
                .into_iter()
                .find(|e| !row.contains_key(e))
            {
                return Err(ConfigError::MissingTransition {
                    round: label(round),
                    event: label(event),
                });
            }
        }
        if let Some(round) = rounds
            .iter()
            .find(|(_, spec)| spec.quorum.threshold() == Threshold::Fixed(0))
            .map(|(round, _)| round)
        {
            return Err(ConfigError::ZeroThreshold {
                round: label(round),
            });
        }

        let mut reachable = BTreeSet::from([initial_round]);
        let mut queue = VecDeque::from([initial_round]);
        while let Some(round) = queue.pop_front() {
            for target in transition_function[&round].values() {
                if reachable.insert(*target) {
                    queue.push_back(*target);
                }
            }
        }
        if let Some(round) = rounds.keys().find(|r| !reachable.contains(*r)) {
            return Err(ConfigError::UnreachableRound {
                round: label(round),
            });
        }

        if let Some((event, _)) = event_to_timeout.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::ZeroTimeout {
                event: label(event),
            });
        }
        for (round, row) in &transition_function {
            if !row.keys().any(|e| event_to_timeout.contains_key(e)) {
                return Err(ConfigError::NoTimeout {
                    round: label(round),
                });
            }
        }

        tracing::debug!(
            rounds = rounds.len(),
            timeouts = event_to_timeout.len(),
            "validated transition function"
        );
        Ok(Self {
            initial_round,
            rounds,
            transition_function,
            event_to_timeout,
        })
    }

    /// Round type the application starts with.
    pub fn initial_round(&self) -> R {
        self.initial_round
    }

    /// All round types.
    pub fn rounds(&self) -> impl Iterator<Item = R> + '_ {
        self.rounds.keys().copied()
    }

    /// Spec of a round type.
    pub fn spec(&self, round: R) -> Option<&Arc<RoundSpec<E>>> {
        self.rounds.get(&round)
    }

    /// Transitions out of a round type.
    pub fn transitions(&self, round: R) -> Option<&BTreeMap<E, R>> {
        self.transition_function.get(&round)
    }

    /// Looks up the round type following `round` on `event`.
    pub fn next_round(&self, round: R, event: E) -> Result<R, TransitionError> {
        self.transition_function
            .get(&round)
            .and_then(|row| row.get(&event))
            .copied()
            .ok_or_else(|| TransitionError::UnknownTransition {
                round: label(round),
                event: label(event),
            })
    }

    /// Timeout of an event, if it is a timeout event.
    pub fn timeout(&self, event: E) -> Option<Duration> {
        self.event_to_timeout.get(&event).copied()
    }

    /// Timeout events of a round type with their durations, ordered by event.
    pub fn round_timeouts(&self, round: R) -> Vec<(E, Duration)> {
        let Some(row) = self.transition_function.get(&round) else {
            return vec![];
        };
        row.keys()
            .filter_map(|e| Some((*e, self.timeout(*e)?)))
            .collect()
    }

    /// Activates a fresh instance of `round` with the given period state.
    pub fn new_round(
        &self,
        round: R,
        state: PeriodState,
    ) -> Result<CollectionRound<E>, TransitionError> {
        let spec = self
            .rounds
            .get(&round)
            .ok_or_else(|| TransitionError::UnknownRound {
                round: label(round),
            })?;
        Ok(CollectionRound::new(spec.clone(), state))
    }
}
