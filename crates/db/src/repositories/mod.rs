//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&SqlitePool` as the first argument.

pub mod output_repo;
pub mod settings_repo;

pub use output_repo::OutputRepo;
pub use settings_repo::SettingsRepo;
