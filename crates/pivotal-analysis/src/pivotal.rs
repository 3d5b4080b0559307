//! Pivotal provider identification.
//!
//! For each slot, the competing bids a rival builder could have seen when the
//! winning bid landed are reduced to the next-highest bid. A provider is
//! pivotal when the winning block, stripped of that provider's profit, would
//! have been worth less than this bid.
//!
//! Each provider is tested against the same baseline with only its own
//! profit removed. When several providers are pivotal in one slot this is
//! not a joint counterfactual; removing two of them together could change
//! the picture.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use pivotal_data::{PivotalProviderRecord, Slot};

use crate::join::{Bid, Block};
use crate::profit::ProviderProfits;

/// Block-archive values are in ETH while fees and bids are in Wei.
pub const WEI_PER_ETH: f64 = 1e18;

/// Converts a block-archive value to Wei.
pub fn eth_to_wei(eth: f64) -> f64 {
    eth * WEI_PER_ETH
}

/// Latest relay timestamp a competing bid may carry to count for `block`.
///
/// The later of the winning bid's first appearance and the slot start. Without
/// a reconstructed winning-bid time the slot start alone is used.
pub fn information_cutoff(
    block: &Block,
    winning_bid_time: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match winning_bid_time {
        Some(ts) => ts.max(block.timestamp),
        None => block.timestamp,
    }
}

/// Highest bid below `winning_bid_value` from a builder other than `winner`
/// received no later than `cutoff`.
///
/// Bids without a value or timestamp are ignored. A bid equal to the winning
/// value does not count.
pub fn next_highest_competing_bid<'a>(
    bids: impl IntoIterator<Item = &'a Bid>,
    winner: &str,
    winning_bid_value: f64,
    cutoff: DateTime<Utc>,
) -> Option<f64> {
    bids.into_iter()
        .filter(|bid| bid.timestamp.is_some_and(|ts| ts <= cutoff))
        .filter(|bid| bid.builder != winner)
        .filter_map(|bid| bid.value)
        .filter(|value| *value < winning_bid_value)
        .fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |b| b.max(value)))
        })
}

/// Pivotal records of one slot.
///
/// Returns `None` when the slot has no competing bid, in which case
/// pivotality is undefined.
pub fn pivotal_providers_for_slot<'a>(
    date: &str,
    block: &Block,
    slot_bids: impl IntoIterator<Item = &'a Bid>,
    winning_bid_time: Option<DateTime<Utc>>,
    profits: &ProviderProfits,
) -> Option<Vec<PivotalProviderRecord>> {
    let winning_bid_value = eth_to_wei(block.bid_value?);
    let winning_block_value = eth_to_wei(block.block_value?);
    let cutoff = information_cutoff(block, winning_bid_time);

    let next_highest =
        next_highest_competing_bid(slot_bids, &block.builder, winning_bid_value, cutoff)?;

    let records = profits
        .providers(block.number)
        .filter(|(_, profit)| *profit != 0.0)
        .filter(|(_, profit)| winning_block_value - profit < next_highest)
        .map(|(provider, profit)| PivotalProviderRecord {
            date: date.to_string(),
            number: block.number,
            slot: block.slot,
            value: winning_block_value,
            winner: block.builder.clone(),
            provider: provider.to_string(),
            profit,
        })
        .collect();
    Some(records)
}

/// Result of evaluating every slot of a day.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DayOutcome {
    /// Records ordered by slot, then provider label.
    pub records: Vec<PivotalProviderRecord>,
    /// Slots present in both the bids and the analysed blocks.
    pub slots_evaluated: usize,
    /// Evaluated slots skipped because no competing bid existed.
    pub slots_without_competitor: usize,
    /// Evaluated slots skipped because the block value or bid value is missing.
    pub slots_missing_values: usize,
}

/// Runs the pivotal test over every slot present in both `bids` and `blocks`.
pub fn identify_pivotal_providers(
    date: &str,
    blocks: &[Block],
    bids: &[Bid],
    winning_bid_times: &HashMap<Slot, DateTime<Utc>>,
    profits: &ProviderProfits,
) -> DayOutcome {
    let blocks_by_slot: HashMap<Slot, &Block> = blocks.iter().map(|b| (b.slot, b)).collect();

    let mut bids_by_slot: BTreeMap<Slot, Vec<&Bid>> = BTreeMap::new();
    for bid in bids {
        if blocks_by_slot.contains_key(&bid.slot) {
            bids_by_slot.entry(bid.slot).or_default().push(bid);
        }
    }

    let mut outcome = DayOutcome::default();
    for (slot, slot_bids) in bids_by_slot {
        let Some(block) = blocks_by_slot.get(&slot) else {
            continue;
        };
        outcome.slots_evaluated += 1;

        if block.block_value.is_none() || block.bid_value.is_none() {
            tracing::debug!(slot, number = block.number, "block value missing, skipping slot");
            outcome.slots_missing_values += 1;
            continue;
        }

        match pivotal_providers_for_slot(
            date,
            block,
            slot_bids,
            winning_bid_times.get(&slot).copied(),
            profits,
        ) {
            Some(records) => outcome.records.extend(records),
            None => outcome.slots_without_competitor += 1,
        }
    }
    outcome
}
