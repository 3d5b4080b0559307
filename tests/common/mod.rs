//! Shared test helpers and utilities.
//!
//! Factory functions for archive rows with sensible defaults, and writers
//! that put them on disk in the layout a run reads.

#![allow(dead_code)]

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMillisecondArray,
    UInt64Array,
};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::TimeDelta;
use parquet::arrow::ArrowWriter;
use pivotal_data::slot_time::slot_to_timestamp;
use pivotal_data::{BidRow, BlockRow, ChannelFlags, PrivateTransaction, Slot};

/// First slot of 2023-04-09 UTC (00:00:11).
pub const DAY_START_SLOT: Slot = 6_181_199;

/// Slots in a UTC day.
pub const SLOTS_PER_DAY: u64 = 7_200;

pub const WEI: f64 = 1e18;

/// Block number of `slot` in the fixtures.
pub fn number_of(slot: Slot) -> u64 {
    slot + 10_800_000
}

/// Block hash of `slot` in the fixtures.
pub fn hash_of(slot: Slot) -> String {
    format!("0x{slot:064x}")
}

/// A block row with values in ETH.
pub fn sample_block(slot: Slot, pubkey: Option<&str>, bid_eth: f64, block_eth: f64) -> BlockRow {
    BlockRow {
        slot,
        number: number_of(slot),
        block_hash: hash_of(slot),
        builder_pubkey: pubkey.map(str::to_string),
        block_value: Some(block_eth),
        bid_value: Some(bid_eth),
    }
}

/// A bid row `offset_ms` after the start of `slot`, value in Wei.
pub fn sample_bid(slot: Slot, block_hash: &str, pubkey: &str, wei: f64, offset_ms: i64) -> BidRow {
    BidRow {
        slot,
        block_hash: block_hash.to_string(),
        builder_pubkey: pubkey.to_string(),
        value: Some(wei),
        timestamp: Some(slot_to_timestamp(slot) + TimeDelta::milliseconds(offset_ms)),
    }
}

/// A private transaction in the block of `slot`, fee in Wei.
pub fn sample_private_tx(
    slot: Slot,
    fee_wei: f64,
    flags: ChannelFlags,
    from: &str,
) -> PrivateTransaction {
    PrivateTransaction {
        block_number: number_of(slot),
        txn_fee: Some(fee_wei),
        flags,
        from: from.to_string(),
        to: Some("0x7a250d5630b4cf539739df2c5dacb4c659f2488d".to_string()),
    }
}

pub fn col(array: impl Array + 'static) -> ArrayRef {
    Arc::new(array)
}

/// Writes one record batch of nullable columns.
///
/// # Panics
/// Panics if the file cannot be written.
pub fn write_parquet(path: &Path, columns: Vec<(&str, ArrayRef)>) {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(
        schema.clone(),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .expect("create record batch");
    let file = File::create(path).expect("create parquet file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("create arrow writer");
    writer.write(&batch).expect("write batch");
    writer.close().expect("close writer");
}

pub fn write_blocks(path: &Path, blocks: &[BlockRow]) {
    write_parquet(
        path,
        vec![
            ("slot", col(UInt64Array::from_iter_values(blocks.iter().map(|b| b.slot)))),
            ("number", col(UInt64Array::from_iter_values(blocks.iter().map(|b| b.number)))),
            (
                "block_hash",
                col(StringArray::from_iter_values(blocks.iter().map(|b| b.block_hash.as_str()))),
            ),
            (
                "builder_pubkey",
                col(StringArray::from_iter(blocks.iter().map(|b| b.builder_pubkey.as_deref()))),
            ),
            (
                "block_value",
                col(Float64Array::from_iter(blocks.iter().map(|b| b.block_value))),
            ),
            ("bid_value", col(Float64Array::from_iter(blocks.iter().map(|b| b.bid_value)))),
        ],
    );
}

fn flag_column(txs: &[PrivateTransaction], get: impl Fn(&ChannelFlags) -> bool) -> ArrayRef {
    col(BooleanArray::from(
        txs.iter().map(|tx| get(&tx.flags)).collect::<Vec<_>>(),
    ))
}

pub fn write_private_txs(path: &Path, txs: &[PrivateTransaction]) {
    write_parquet(
        path,
        vec![
            (
                "blockNumber",
                col(UInt64Array::from_iter_values(txs.iter().map(|tx| tx.block_number))),
            ),
            ("txn_fee", col(Float64Array::from_iter(txs.iter().map(|tx| tx.txn_fee)))),
            ("MEV-Share", flag_column(txs, |f| f.mev_share)),
            ("MEV Blocker", flag_column(txs, |f| f.mev_blocker)),
            ("Maestro", flag_column(txs, |f| f.maestro)),
            ("Banana Gun", flag_column(txs, |f| f.banana_gun)),
            ("Unibot", flag_column(txs, |f| f.unibot)),
            ("from", col(StringArray::from_iter_values(txs.iter().map(|tx| tx.from.as_str())))),
            ("to", col(StringArray::from_iter(txs.iter().map(|tx| tx.to.as_deref())))),
        ],
    );
}

pub fn write_bids(path: &Path, bids: &[BidRow]) {
    write_parquet(
        path,
        vec![
            ("slot", col(UInt64Array::from_iter_values(bids.iter().map(|b| b.slot)))),
            (
                "block_hash",
                col(StringArray::from_iter_values(bids.iter().map(|b| b.block_hash.as_str()))),
            ),
            (
                "builder_pubkey",
                col(StringArray::from_iter_values(bids.iter().map(|b| b.builder_pubkey.as_str()))),
            ),
            ("value", col(Float64Array::from_iter(bids.iter().map(|b| b.value)))),
            (
                "timestamp_ms",
                col(TimestampMillisecondArray::from(
                    bids.iter()
                        .map(|b| b.timestamp.map(|ts| ts.timestamp_millis()))
                        .collect::<Vec<_>>(),
                )),
            ),
        ],
    );
}

/// Writes `searchers.csv` and `builders.json` into `data_dir`.
pub fn write_reference(data_dir: &Path, searchers: &[&str], builders: &[(&str, &[&str])]) {
    let mut csv = String::from("address,label\n");
    for address in searchers {
        csv.push_str(&format!("{address},searcher\n"));
    }
    std::fs::write(data_dir.join("searchers.csv"), csv).expect("write searchers.csv");

    let entries: Vec<String> = builders
        .iter()
        .map(|(name, keys)| {
            let keys: Vec<String> = keys.iter().map(|k| format!("\"{k}\"")).collect();
            format!("\"{name}\": [{}]", keys.join(", "))
        })
        .collect();
    std::fs::write(
        data_dir.join("builders.json"),
        format!("{{{}}}", entries.join(", ")),
    )
    .expect("write builders.json");
}
