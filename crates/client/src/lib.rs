//! HTTP clients for the Horde and the ratings service.
//!
//! Every response is run through [`horde_core::response::validate_response`]
//! before it is decoded into the typed messages in [`messages`].

pub mod api;
pub mod messages;
pub mod ratings;
pub mod reporter;

pub use api::{HordeApi, HordeApiError};
pub use ratings::RatingsApi;
pub use reporter::{ErrorReporter, MemoryReporter, TracingReporter};
