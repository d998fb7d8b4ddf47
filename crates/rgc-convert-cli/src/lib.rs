//! rgc-convert command line front end
//!
//! Reads chart files and archives from the host, runs the conversion batch
//! over an in-memory virtual filesystem and writes the exported artifacts
//! into a host directory.

pub mod cli;
pub mod sink;
