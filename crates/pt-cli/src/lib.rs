//! pantheon-test: command-line front end for tunnel experiments

pub mod cli;
pub mod output;
