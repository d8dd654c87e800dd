pub mod output;
pub mod setting;
