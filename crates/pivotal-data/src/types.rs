//! Type definitions for auction, block and order-flow records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consensus-layer slot index.
pub type Slot = u64;

/// One relayed builder bid as read from a daily bid archive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BidRow {
    /// Slot the bid was submitted for.
    pub slot: Slot,
    /// Hash of the block the bid commits to (hex text).
    pub block_hash: String,
    /// Raw BLS public key of the submitting builder.
    pub builder_pubkey: String,
    /// Bid value in Wei (None if the archive value did not parse).
    pub value: Option<f64>,
    /// Relay receive time (None if the archive value did not parse).
    pub timestamp: Option<DateTime<Utc>>,
}

/// One proposed block as read from the block archive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRow {
    /// Slot the block was proposed in.
    pub slot: Slot,
    /// Execution block number.
    pub number: u64,
    /// Block hash (hex text).
    pub block_hash: String,
    /// Raw BLS public key of the winning builder (None for locally built blocks).
    pub builder_pubkey: Option<String>,
    /// Realized block value in ETH.
    pub block_value: Option<f64>,
    /// Winning bid value in ETH.
    pub bid_value: Option<f64>,
}

/// Known private order-flow channels a transaction may be tagged with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFlags {
    /// Relayed through MEV-Share.
    pub mev_share: bool,
    /// Relayed through MEV Blocker.
    pub mev_blocker: bool,
    /// Submitted by the Maestro trading bot.
    pub maestro: bool,
    /// Submitted by the Banana Gun trading bot.
    pub banana_gun: bool,
    /// Submitted by the Unibot trading bot.
    pub unibot: bool,
}

/// Transaction that never appeared in the public mempool before inclusion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivateTransaction {
    /// Containing block number.
    pub block_number: u64,
    /// Fee paid in Wei (None if the archive value did not parse).
    pub txn_fee: Option<f64>,
    /// Distribution channel flags.
    pub flags: ChannelFlags,
    /// Sender address (hex text).
    pub from: String,
    /// Recipient address (None for contract creation or malformed rows).
    pub to: Option<String>,
}

/// A provider whose removed profit would have lost the winning block its auction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PivotalProviderRecord {
    /// Calendar date of the slot, `YYYYMMDD`.
    pub date: String,
    /// Block number.
    pub number: u64,
    /// Slot.
    pub slot: Slot,
    /// Winning block value in Wei.
    pub value: f64,
    /// Canonical name of the winning builder.
    pub winner: String,
    /// Provider label.
    pub provider: String,
    /// Provider profit in Wei.
    pub profit: f64,
}
