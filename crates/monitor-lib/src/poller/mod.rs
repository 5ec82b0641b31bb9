//! Polling orchestration
//!
//! One cycle fans out a scrape task and a latency task per monitored host;
//! each scrape task fans out one store write per returned metric. Both
//! levels are joined before the batch-ready signal is published, and cycles
//! never overlap.

mod r#loop;
mod tasks;


pub use r#loop::{CycleReport, PollConfig, Poller, PollerBuilder};
pub use tasks::{LatencyOutcome, ScrapeOutcome};
