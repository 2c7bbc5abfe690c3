//! Host-side plumbing for the `millstream` binary: CLI surface, TOML
//! configuration, operator prompts and the Grbl serial streamer.

pub mod cli;
pub mod config;
pub mod prompt;
pub mod stream;
