//! Metrics API server answering per-container stats for one host

pub mod router;
