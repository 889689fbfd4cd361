//! rxweave command-line driver
//!
//! Configuration loading, input discovery and the parallel file pipeline
//! behind the `rxweave` binary.

pub mod commands;
pub mod config;
pub mod output;
pub mod pipeline;

pub use config::{Backend, Config, ConfigError};
pub use pipeline::{discover_inputs, process_all, process_file, write_artifacts, Artifact, FileReport, Mode, WriteStats};
