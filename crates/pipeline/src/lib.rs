//! Request lifecycles and application state for the Horde client.
//!
//! Each lifecycle (generation, interrogation, rating) follows the same
//! shape: validate locally, submit, poll on a fixed interval, collect.
//! Every failure is handed to the configured
//! [`ErrorReporter`](horde_client::ErrorReporter) before the lifecycle
//! aborts, and every transition is broadcast on the [`events::EventBus`].

pub mod dashboard;
pub mod error;
pub mod events;
pub mod export;
pub mod generation;
pub mod interrogation;
pub mod outputs;
pub mod rating;
pub mod session;
pub mod settings;
pub mod storage;
pub mod workers;
