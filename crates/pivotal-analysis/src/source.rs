//! Order-flow source attribution for private transactions.
//!
//! Precedence, first matching tier wins:
//! 1. relay channels (MEV-Share, MEV Blocker), both may fire
//! 2. direct submission bots (Maestro, Banana Gun, Unibot), any may fire
//! 3. sender/recipient identity: jaredfromsubway.eth, then known searchers

use pivotal_data::{PrivateTransaction, Searchers};

pub const MEV_SHARE: &str = "MEV-Share";
pub const MEV_BLOCKER: &str = "MEV Blocker";
pub const MAESTRO: &str = "Maestro";
pub const BANANA_GUN: &str = "Banana Gun";
pub const UNIBOT: &str = "Unibot";

/// Sender address of the jaredfromsubway.eth searcher (lowercase).
pub const JAREDFROMSUBWAY_ADDRESS: &str = "0xae2fc483527b8ef99eb5d9b44875f005ba1fae13";
pub const JAREDFROMSUBWAY: &str = "jaredfromsubway.eth";

/// Prefix of self-attributed searcher labels.
pub const SEARCHER_PREFIX: &str = "Searcher: ";

/// A private transaction paired with its provider labels.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributedTransaction<'a> {
    pub tx: &'a PrivateTransaction,
    /// Ordered, duplicate-free provider labels. May be empty.
    pub source: Vec<String>,
}

/// Labels transactions with the order-flow channels they arrived through.
#[derive(Clone, Copy, Debug)]
pub struct SourceAttributor<'a> {
    searchers: &'a Searchers,
}

impl<'a> SourceAttributor<'a> {
    pub fn new(searchers: &'a Searchers) -> Self {
        Self { searchers }
    }

    /// Returns the provider labels of `tx`.
    pub fn source(&self, tx: &PrivateTransaction) -> Vec<String> {
        let flags = &tx.flags;

        let relay: Vec<String> = [(flags.mev_share, MEV_SHARE), (flags.mev_blocker, MEV_BLOCKER)]
            .into_iter()
            .filter_map(|(set, label)| set.then(|| label.to_string()))
            .collect();
        if !relay.is_empty() {
            return relay;
        }

        let direct: Vec<String> = [
            (flags.maestro, MAESTRO),
            (flags.banana_gun, BANANA_GUN),
            (flags.unibot, UNIBOT),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then(|| label.to_string()))
        .collect();
        if !direct.is_empty() {
            return direct;
        }

        let from = tx.from.to_lowercase();
        if from == JAREDFROMSUBWAY_ADDRESS {
            return vec![JAREDFROMSUBWAY.to_string()];
        }
        if !from.is_empty() && self.searchers.contains(&from) {
            return vec![format!("{SEARCHER_PREFIX}{from}")];
        }
        match tx.to.as_deref().map(str::to_lowercase) {
            Some(to) if !to.is_empty() && self.searchers.contains(&to) => {
                vec![format!("{SEARCHER_PREFIX}{to}")]
            }
            _ => Vec::new(),
        }
    }

    /// Attributes every transaction of a batch independently.
    pub fn attribute<'t, I>(&self, txs: I) -> Vec<AttributedTransaction<'t>>
    where
        I: IntoIterator<Item = &'t PrivateTransaction>,
    {
        txs.into_iter()
            .map(|tx| AttributedTransaction {
                tx,
                source: self.source(tx),
            })
            .collect()
    }
}
