//! Test-only utilities.
use std::{io::IsTerminal as _, time::Instant};

use abci_engine::testonly::{initial_state, test_app, TestEvent, TestRound};

use crate::Driver;

/// Installs a tracing subscriber writing to the test output.
/// When executed by nextest in process-per-test mode, also turns panics into aborts,
/// so that a panic on a spawned task fails the test instead of being swallowed.
pub fn abort_on_panic() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .with_ansi(std::env::var("NO_COLOR").is_err() && std::io::stdout().is_terminal())
        .with_line_number(true)
        .try_init();

    // https://nexte.st/book/env-vars.html#environment-variables-nextest-sets
    let Ok(nextest) = std::env::var("NEXTEST") else {
        return;
    };
    let Ok(mode) = std::env::var("NEXTEST_EXECUTION_MODE") else {
        return;
    };
    if nextest != "1" || mode != "process-per-test" {
        return;
    }
    tracing::info!("[panic=abort] enabled");
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::abort();
    }));
}

/// Driver of the engine's test application with `n` participants.
pub fn test_driver(n: usize, now: Instant) -> Driver<TestRound, TestEvent> {
    Driver::new(test_app().into(), initial_state(n), now).unwrap()
}
