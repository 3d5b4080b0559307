//! pivotal-data crate
//!
//! Auction, block and private order-flow records, slot/time conversion,
//! parquet archive readers, reference tables and the SQLite result sink.

pub mod archive;
pub mod columns;
pub mod reference;
pub mod slot_time;
pub mod store;
pub mod types;

pub use reference::{BuilderAliases, ReferenceData, Searchers};
pub use store::{RecordSink, SqliteSink};
pub use types::{BidRow, BlockRow, ChannelFlags, PivotalProviderRecord, PrivateTransaction, Slot};
