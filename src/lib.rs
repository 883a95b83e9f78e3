//! Cooperative cancellation signals and a shell-step runner built on them.
//!
//! [`signal::any_signal`] folds any number of optional [`signal::AbortSignal`]s
//! into one; the runner uses it to guard every step with the run's timeout,
//! deadline, Ctrl-C and failure signals.

pub mod config;
pub mod env;
pub mod executor;
pub mod runner;
pub mod signal;
