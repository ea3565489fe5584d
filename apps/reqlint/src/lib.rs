//! # reqlint
//!
//! Library side of the `reqlint` binary: the CLI, the HTTP API and the
//! configuration file. The manifest logic itself lives in `reqlint-core`.

pub mod api;
pub mod cli;
pub mod config;
