//! Collector daemon: configuration and admin API
//!
//! The binary in `main.rs` wires these together with the poll loop from
//! `monitor-lib`.

pub mod api;
pub mod config;
