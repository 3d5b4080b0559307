//! Reconstructs when the eventually-winning block first became visible.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pivotal_data::Slot;

use crate::join::{Bid, Block};

/// Earliest relay timestamp per slot among bids for a finalized block hash.
///
/// Only bids whose block hash belongs to one of `blocks` count. Slots with no
/// such bid are absent from the result.
pub fn winning_bid_times(bids: &[Bid], blocks: &[Block]) -> HashMap<Slot, DateTime<Utc>> {
    let finalized: HashSet<&str> = blocks
        .iter()
        .map(|b| b.block_hash.as_str())
        .filter(|hash| !hash.is_empty())
        .collect();

    let mut earliest: HashMap<Slot, DateTime<Utc>> = HashMap::new();
    for bid in bids {
        let Some(ts) = bid.timestamp else {
            continue;
        };
        if !finalized.contains(bid.block_hash.as_str()) {
            continue;
        }
        earliest
            .entry(bid.slot)
            .and_modify(|current| *current = (*current).min(ts))
            .or_insert(ts);
    }
    earliest
}
