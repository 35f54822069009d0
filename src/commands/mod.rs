pub mod actions;
pub mod clear;
pub mod play;
pub mod record;
pub mod utils;

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
