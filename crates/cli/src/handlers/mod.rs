pub mod account;
pub mod generate;
pub mod interrogate;
pub mod mask;
pub mod outputs;
pub mod rate;
pub mod settings;
