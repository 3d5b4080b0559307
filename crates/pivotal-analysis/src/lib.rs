//! pivotal-analysis crate
//!
//! Source attribution, dataset alignment, winning-bid time reconstruction,
//! provider profit aggregation and the pivotal provider test, plus the
//! per-date driver tying them together.

pub mod join;
pub mod pipeline;
pub mod pivotal;
pub mod profit;
pub mod source;
pub mod winning_bid;

pub use pipeline::{run, RunConfig, RunSummary};
