//! Domain logic for the Horde client.
//!
//! Everything in this crate is free of I/O: request parameters and their
//! validation, the response validation helper, the positional output
//! registry, leaderboard ranking, progress estimation, media encoding
//! helpers and the inpainting mask editor.

pub mod error;
pub mod leaderboard;
pub mod mask;
pub mod media;
pub mod params;
pub mod progress;
pub mod query;
pub mod registry;
pub mod response;
pub mod share;
pub mod types;
