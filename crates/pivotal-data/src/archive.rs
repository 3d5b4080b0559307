//! Parquet archive readers for blocks, private transactions and daily bids.
//!
//! Blocks and private transactions are read in full once per run. Bids are
//! archived one file per UTC day (`YYYYMMDD.parquet`) and read one day at a
//! time so the working set stays bounded to a single day of bids.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use eyre::{Context, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::columns::{
    bool_values, f64_values, required, string_values, timestamp_values, u64_values,
};
use crate::types::{BidRow, BlockRow, ChannelFlags, PrivateTransaction};

/// Private-transaction archive flag columns, in [`ChannelFlags`] field order.
pub const FLAG_COLUMNS: [&str; 5] = ["MEV-Share", "MEV Blocker", "Maestro", "Banana Gun", "Unibot"];

/// Streams every record batch of a parquet file through `visit`.
fn for_each_batch(
    path: &Path,
    mut visit: impl FnMut(&RecordBatch) -> Result<()>,
) -> Result<usize> {
    let file = File::open(path)
        .wrap_err_with(|| format!("failed to open parquet file: {}", path.display()))?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .wrap_err("failed to parse parquet metadata")?
        .build()
        .wrap_err("failed to build parquet record batch reader")?;

    let mut rows = 0;
    for batch_result in reader {
        let batch = batch_result.wrap_err("failed to read record batch")?;
        rows += batch.num_rows();
        visit(&batch)?;
    }
    Ok(rows)
}

/// Reads the block archive.
///
/// Rows without a slot or block number cannot be joined and are dropped.
///
/// # Errors
/// Returns error if the file cannot be read or a required column is missing.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_blocks(path: &Path) -> Result<Vec<BlockRow>> {
    let started = Instant::now();
    let mut blocks = Vec::new();

    let rows = for_each_batch(path, |batch| {
        let slots = u64_values(required(batch, "slot")?, "slot")?;
        let numbers = u64_values(required(batch, "number")?, "number")?;
        let hashes = string_values(required(batch, "block_hash")?, "block_hash")?;
        let pubkeys = string_values(required(batch, "builder_pubkey")?, "builder_pubkey")?;
        let block_values = f64_values(required(batch, "block_value")?, "block_value")?;
        let bid_values = f64_values(required(batch, "bid_value")?, "bid_value")?;

        for i in 0..batch.num_rows() {
            let (Some(slot), Some(number)) = (slots[i], numbers[i]) else {
                continue;
            };
            blocks.push(BlockRow {
                slot,
                number,
                block_hash: hashes[i].clone().unwrap_or_default(),
                builder_pubkey: pubkeys[i].clone(),
                block_value: block_values[i],
                bid_value: bid_values[i],
            });
        }
        Ok(())
    })?;

    tracing::info!(
        rows,
        blocks = blocks.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded block archive"
    );
    Ok(blocks)
}

/// Reads the private-transaction archive.
///
/// A missing flag column reads as all-false. Rows without a block number are
/// dropped since they cannot be attributed to a block.
///
/// # Errors
/// Returns error if the file cannot be read or a required column is missing.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_private_transactions(path: &Path) -> Result<Vec<PrivateTransaction>> {
    let started = Instant::now();
    let mut txs = Vec::new();
    let mut warned_missing = false;

    let rows = for_each_batch(path, |batch| {
        let numbers = u64_values(required(batch, "blockNumber")?, "blockNumber")?;
        let fees = f64_values(required(batch, "txn_fee")?, "txn_fee")?;
        let from = string_values(required(batch, "from")?, "from")?;
        let to = string_values(required(batch, "to")?, "to")?;

        let missing: Vec<&str> = FLAG_COLUMNS
            .into_iter()
            .filter(|name| batch.column_by_name(name).is_none())
            .collect();
        if !missing.is_empty() && !warned_missing {
            tracing::warn!(columns = ?missing, "flag columns missing, reading as false");
            warned_missing = true;
        }

        let mut flags = Vec::with_capacity(FLAG_COLUMNS.len());
        for name in FLAG_COLUMNS {
            match batch.column_by_name(name) {
                Some(column) => flags.push(bool_values(column, name)?),
                None => flags.push(vec![false; batch.num_rows()]),
            }
        }

        for i in 0..batch.num_rows() {
            let Some(block_number) = numbers[i] else {
                continue;
            };
            txs.push(PrivateTransaction {
                block_number,
                txn_fee: fees[i],
                flags: ChannelFlags {
                    mev_share: flags[0][i],
                    mev_blocker: flags[1][i],
                    maestro: flags[2][i],
                    banana_gun: flags[3][i],
                    unibot: flags[4][i],
                },
                from: from[i].clone().unwrap_or_default(),
                to: to[i].clone(),
            });
        }
        Ok(())
    })?;

    let missing_fees = txs.iter().filter(|tx| tx.txn_fee.is_none()).count();
    tracing::info!(
        rows,
        txs = txs.len(),
        missing_fees,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded private transaction archive"
    );
    Ok(txs)
}

/// Path of the bid archive for `date_key` (`YYYYMMDD`).
pub fn bids_path(bids_dir: &Path, date_key: &str) -> PathBuf {
    bids_dir.join(format!("{date_key}.parquet"))
}

/// Reads one day of relay bids.
///
/// Rows without a slot are dropped. A missing file is an error: a date that
/// has blocks is expected to have bids.
///
/// # Errors
/// Returns error if the file does not exist, cannot be read, or a required
/// column is missing. The `std::io::Error` stays in the report chain.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_daily_bids(path: &Path) -> Result<Vec<BidRow>> {
    let started = Instant::now();
    let mut bids = Vec::new();

    let rows = for_each_batch(path, |batch| {
        let slots = u64_values(required(batch, "slot")?, "slot")?;
        let hashes = string_values(required(batch, "block_hash")?, "block_hash")?;
        let pubkeys = string_values(required(batch, "builder_pubkey")?, "builder_pubkey")?;
        let values = f64_values(required(batch, "value")?, "value")?;
        let timestamps = timestamp_values(required(batch, "timestamp_ms")?, "timestamp_ms")?;

        for i in 0..batch.num_rows() {
            let Some(slot) = slots[i] else {
                continue;
            };
            bids.push(BidRow {
                slot,
                block_hash: hashes[i].clone().unwrap_or_default(),
                builder_pubkey: pubkeys[i].clone().unwrap_or_default(),
                value: values[i],
                timestamp: timestamps[i],
            });
        }
        Ok(())
    })?;

    tracing::info!(
        rows,
        bids = bids.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded daily bids"
    );
    Ok(bids)
}
