//! # flowcal-cli
//!
//! Argument definitions and run configuration for the `flowcal` binary.

pub mod cli;
pub mod config;
