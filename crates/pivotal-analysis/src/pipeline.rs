//! Per-date batch driver.
//!
//! Blocks and private transactions are loaded once. Each UTC day is then
//! processed end to end (bids, attribution, profit, cutoffs, pivotal test)
//! and flushed to the sink before the next day's bids are read.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pivotal_data::archive::{bids_path, load_blocks, load_daily_bids, load_private_transactions};
use pivotal_data::slot_time::SlotClock;
use pivotal_data::{BidRow, PivotalProviderRecord, RecordSink, ReferenceData};

use crate::join::{partition_by_date, prepare_blocks, resolve_bids, DateBatch};
use crate::pivotal::{identify_pivotal_providers, DayOutcome};
use crate::profit::ProviderProfits;
use crate::source::SourceAttributor;
use crate::winning_bid::winning_bid_times;

/// File locations of a run.
///
/// [`run`] reads the archives. The caller builds the [`ReferenceData`] from
/// `data_dir` and the sink from `db_path`.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// SQLite database receiving the results.
    pub db_path: PathBuf,
    /// Private-transaction parquet archive.
    pub private_transactions_path: PathBuf,
    /// Block parquet archive.
    pub blocks_path: PathBuf,
    /// Directory of `YYYYMMDD.parquet` bid archives.
    pub bids_dir: PathBuf,
    /// Directory holding `searchers.csv` and `builders.json`.
    pub data_dir: PathBuf,
}

/// Pivotal totals of one provider over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderTally {
    pub pivotal_slots: usize,
    /// Summed profit in Wei over the pivotal slots.
    pub pivotal_profit: f64,
}

/// What a run did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub dates: usize,
    pub slots_evaluated: usize,
    pub slots_without_competitor: usize,
    /// Slots skipped because the block value or bid value is missing.
    pub slots_missing_values: usize,
    pub records: usize,
    /// Keyed by provider label.
    pub providers: BTreeMap<String, ProviderTally>,
}

impl RunSummary {
    fn absorb(&mut self, outcome: &DayOutcome) {
        self.dates += 1;
        self.slots_evaluated += outcome.slots_evaluated;
        self.slots_without_competitor += outcome.slots_without_competitor;
        self.slots_missing_values += outcome.slots_missing_values;
        self.records += outcome.records.len();
        for record in &outcome.records {
            let tally = self.providers.entry(record.provider.clone()).or_default();
            tally.pivotal_slots += 1;
            tally.pivotal_profit += record.profit;
        }
    }
}

/// Analyses one day given its batch and its raw bids.
#[tracing::instrument(skip_all, fields(date = %batch.date))]
pub fn process_date(
    batch: &DateBatch<'_>,
    bid_rows: Vec<BidRow>,
    reference: &ReferenceData,
) -> DayOutcome {
    let bids = resolve_bids(bid_rows, &reference.builders);

    let started = Instant::now();
    let cutoffs = winning_bid_times(&bids, &batch.blocks);
    tracing::info!(
        slots = cutoffs.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "computed winning bid timestamps"
    );

    let started = Instant::now();
    let attributed =
        SourceAttributor::new(&reference.searchers).attribute(batch.private_txs.iter().copied());
    let profits = ProviderProfits::aggregate(&attributed);
    tracing::info!(
        txs = attributed.len(),
        blocks_with_providers = profits.block_count(),
        private_fees_wei = profits.total_private_fees(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "computed provider profit"
    );

    let started = Instant::now();
    let outcome =
        identify_pivotal_providers(&batch.date, &batch.blocks, &bids, &cutoffs, &profits);
    tracing::info!(
        slots = outcome.slots_evaluated,
        without_competitor = outcome.slots_without_competitor,
        missing_values = outcome.slots_missing_values,
        records = outcome.records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "identified pivotal providers"
    );
    outcome
}

/// Runs the whole analysis, appending each day's records to `sink`.
///
/// A day's records are durable once its append returns; a failure on a later
/// day leaves them in place.
///
/// # Errors
/// Returns error if an archive cannot be read, a day's bid file is missing,
/// or the sink rejects a batch.
pub fn run(
    config: &RunConfig,
    reference: &ReferenceData,
    sink: &mut impl RecordSink,
) -> Result<RunSummary> {
    tracing::info!("loading data");
    let private_txs = load_private_transactions(&config.private_transactions_path)?;
    let block_rows = load_blocks(&config.blocks_path)?;

    let mut clock = SlotClock::new();
    let blocks = prepare_blocks(block_rows, &reference.builders, &mut clock);
    let batches = partition_by_date(blocks, &private_txs);
    tracing::info!(dates = batches.len(), "start identifying pivotal providers by date");

    let progress = ProgressBar::new(batches.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} dates {msg}")
            .wrap_err("invalid progress bar template")?,
    );

    let mut summary = RunSummary::default();
    for batch in &batches {
        progress.set_message(batch.date.clone());

        let path = bids_path(&config.bids_dir, &batch.date);
        let bid_rows = load_daily_bids(&path)
            .wrap_err_with(|| format!("bids for {} could not be loaded", batch.date))?;
        let outcome = process_date(batch, bid_rows, reference);

        flush(sink, &batch.date, &outcome.records)?;
        summary.absorb(&outcome);
        progress.inc(1);
    }
    progress.finish_with_message("done");

    tracing::info!(
        dates = summary.dates,
        slots = summary.slots_evaluated,
        without_competitor = summary.slots_without_competitor,
        missing_values = summary.slots_missing_values,
        records = summary.records,
        "pivotal provider identification finished"
    );
    Ok(summary)
}

fn flush(sink: &mut impl RecordSink, date: &str, records: &[PivotalProviderRecord]) -> Result<()> {
    let started = Instant::now();
    let written = sink
        .append(date, records)
        .wrap_err_with(|| format!("failed to append records for {date}"))?;
    tracing::info!(
        date,
        written,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "appended records"
    );
    Ok(())
}
