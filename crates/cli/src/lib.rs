//! Command-line front end for the Horde client.

pub mod cli;
pub mod config;
pub mod context;
pub mod handlers;
pub mod presentation;
