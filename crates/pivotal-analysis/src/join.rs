//! Aligns the block, bid and private-transaction datasets by UTC day.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use pivotal_data::slot_time::{date_key, SlotClock};
use pivotal_data::{BidRow, BlockRow, BuilderAliases, PrivateTransaction, Slot};

/// A proposed block with its builder resolved and its proposal time derived.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub slot: Slot,
    pub number: u64,
    pub block_hash: String,
    /// Canonical name of the winning builder.
    pub builder: String,
    /// Realized block value in ETH.
    pub block_value: Option<f64>,
    /// Winning bid value in ETH.
    pub bid_value: Option<f64>,
    /// Start of the slot.
    pub timestamp: DateTime<Utc>,
    /// UTC day of `timestamp`, `YYYYMMDD`.
    pub date: String,
}

/// A relay bid with its builder resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct Bid {
    pub slot: Slot,
    pub block_hash: String,
    pub builder: String,
    /// Value in Wei.
    pub value: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Everything needed to analyse one UTC day, minus its bids.
#[derive(Clone, Debug)]
pub struct DateBatch<'a> {
    pub date: String,
    pub blocks: Vec<Block>,
    pub private_txs: Vec<&'a PrivateTransaction>,
}

/// Drops blocks without a builder key and resolves the rest.
pub fn prepare_blocks(
    rows: Vec<BlockRow>,
    builders: &BuilderAliases,
    clock: &mut SlotClock,
) -> Vec<Block> {
    rows.into_iter()
        .filter_map(|row| {
            let pubkey = row.builder_pubkey?;
            let timestamp = clock.timestamp(row.slot);
            Some(Block {
                slot: row.slot,
                number: row.number,
                block_hash: row.block_hash,
                builder: builders.resolve(&pubkey),
                block_value: row.block_value,
                bid_value: row.bid_value,
                timestamp,
                date: date_key(timestamp),
            })
        })
        .collect()
}

/// Resolves the builder of every bid.
pub fn resolve_bids(rows: Vec<BidRow>, builders: &BuilderAliases) -> Vec<Bid> {
    rows.into_iter()
        .map(|row| Bid {
            slot: row.slot,
            builder: builders.resolve(&row.builder_pubkey),
            block_hash: row.block_hash,
            value: row.value,
            timestamp: row.timestamp,
        })
        .collect()
}

/// Groups blocks by day and selects each day's private transactions.
///
/// Batches come back in ascending date order. A transaction belongs to the
/// day of the block that contains it; transactions in blocks outside the
/// analysed set are not part of any batch.
pub fn partition_by_date(blocks: Vec<Block>, txs: &[PrivateTransaction]) -> Vec<DateBatch<'_>> {
    let mut by_number: HashMap<u64, Vec<&PrivateTransaction>> = HashMap::new();
    for tx in txs {
        by_number.entry(tx.block_number).or_default().push(tx);
    }

    let mut by_date: BTreeMap<String, Vec<Block>> = BTreeMap::new();
    for block in blocks {
        by_date.entry(block.date.clone()).or_default().push(block);
    }

    by_date
        .into_iter()
        .map(|(date, mut blocks)| {
            blocks.sort_by_key(|b| b.slot);
            let mut numbers: Vec<u64> = blocks.iter().map(|b| b.number).collect();
            numbers.sort_unstable();
            numbers.dedup();
            let private_txs = numbers
                .iter()
                .filter_map(|n| by_number.get(n))
                .flatten()
                .copied()
                .collect();
            DateBatch {
                date,
                blocks,
                private_txs,
            }
        })
        .collect()
}
