//! Per-block provider profit from attributed private transactions.
//!
//! Fees are in Wei. A transaction with several labels credits its full fee to
//! each of them. Transactions whose fee did not parse contribute nothing.

use std::collections::{BTreeMap, HashMap};

use crate::source::AttributedTransaction;

/// Summed fees keyed by block number and provider label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderProfits {
    by_block: HashMap<u64, BTreeMap<String, f64>>,
    private_fees: f64,
}

impl ProviderProfits {
    /// Sums fees per (block number, label), and over all transactions
    /// regardless of label.
    pub fn aggregate(txs: &[AttributedTransaction<'_>]) -> Self {
        let mut profits = Self::default();
        for attributed in txs {
            let Some(fee) = attributed.tx.txn_fee else {
                continue;
            };
            let number = attributed.tx.block_number;

            if !attributed.source.is_empty() {
                let providers = profits.by_block.entry(number).or_default();
                for label in &attributed.source {
                    *providers.entry(label.clone()).or_insert(0.0) += fee;
                }
            }
            profits.private_fees += fee;
        }
        profits
    }

    /// Providers of block `number` with their profit, ordered by label.
    pub fn providers(&self, number: u64) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.by_block
            .get(&number)
            .into_iter()
            .flatten()
            .map(|(label, profit)| (label.as_str(), *profit))
    }

    /// Profit of one provider in block `number`.
    pub fn profit(&self, number: u64, provider: &str) -> f64 {
        self.by_block
            .get(&number)
            .and_then(|providers| providers.get(provider))
            .copied()
            .unwrap_or(0.0)
    }

    /// Private-transaction fees summed over every block, attributed or not.
    pub fn total_private_fees(&self) -> f64 {
        self.private_fees
    }

    /// Number of blocks with at least one attributed provider.
    pub fn block_count(&self) -> usize {
        self.by_block.len()
    }
}
