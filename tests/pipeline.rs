//! End-to-end runs over parquet archives written to a temp dir.

mod common;

use std::io::ErrorKind;

use common::*;
use pivotal_analysis::{run, RunConfig};
use pivotal_data::{BlockRow, ChannelFlags, PivotalProviderRecord, ReferenceData, SqliteSink};
use tempfile::TempDir;

const TITAN_KEY: &str = "0xtitan-key";
const BEAVER_KEY: &str = "0xbeaver-key";
const UNMAPPED_KEY: &str = "0xa1b2c3d4e5f6a7b8";
const SEARCHER: &str = "0x5EA7C4E5000000000000000000000000000000AB";
const USER: &str = "0x00000000000000000000000000000000000000aa";

const S1: u64 = DAY_START_SLOT;
const S2: u64 = DAY_START_SLOT + 1;
const S3: u64 = DAY_START_SLOT + 2;
const S4: u64 = DAY_START_SLOT + 3;
const S5: u64 = DAY_START_SLOT + 4;
const T1: u64 = DAY_START_SLOT + SLOTS_PER_DAY;

struct Fixture {
    _dir: TempDir,
    config: RunConfig,
}

fn flags(set: impl FnOnce(&mut ChannelFlags)) -> ChannelFlags {
    let mut flags = ChannelFlags::default();
    set(&mut flags);
    flags
}

/// Two days of archives: 2023-04-09 and 2023-04-10.
fn two_day_fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("create temp dir");
    let data_dir = dir.path().join("data");
    let bids_dir = dir.path().join("bids");
    std::fs::create_dir_all(&data_dir).expect("create data dir");
    std::fs::create_dir_all(&bids_dir).expect("create bids dir");

    write_reference(
        &data_dir,
        &[SEARCHER],
        &[("Titan", &[TITAN_KEY]), ("beaverbuild", &[BEAVER_KEY])],
    );

    let blocks = vec![
        sample_block(S1, Some(TITAN_KEY), 12.0, 15.0),
        sample_block(S2, Some(UNMAPPED_KEY), 1.0, 2.0),
        sample_block(S3, None, 1.0, 2.0),
        sample_block(S4, Some(TITAN_KEY), 1.0, 2.0),
        BlockRow {
            block_value: None,
            ..sample_block(S5, Some(TITAN_KEY), 1.0, 2.0)
        },
        sample_block(T1, Some(TITAN_KEY), 1.0, 2.0),
    ];
    write_blocks(&dir.path().join("blocks.parquet"), &blocks);

    let txs = vec![
        sample_private_tx(S1, 6.0 * WEI, flags(|f| f.mev_share = true), USER),
        sample_private_tx(S1, 2.0 * WEI, flags(|f| f.maestro = true), USER),
        sample_private_tx(S1, 5.5 * WEI, ChannelFlags::default(), SEARCHER),
        sample_private_tx(S2, 0.5 * WEI, flags(|f| f.mev_blocker = true), USER),
        sample_private_tx(S4, 1.0 * WEI, flags(|f| f.banana_gun = true), USER),
        sample_private_tx(S5, 1.5 * WEI, flags(|f| f.mev_share = true), USER),
        sample_private_tx(T1, 1.08 * WEI, flags(|f| f.unibot = true), USER),
    ];
    write_private_txs(&dir.path().join("private_txs.parquet"), &txs);

    write_bids(
        &bids_dir.join("20230409.parquet"),
        &[
            sample_bid(S1, &hash_of(S1), TITAN_KEY, 12.0 * WEI, -500),
            sample_bid(S1, "0xb1", BEAVER_KEY, 10.0 * WEI, -300),
            sample_bid(S1, "0xb2", BEAVER_KEY, 11.0 * WEI, 2_000),
            sample_bid(S2, &hash_of(S2), UNMAPPED_KEY, 1.0 * WEI, -200),
            sample_bid(S2, "0xa2", UNMAPPED_KEY, 0.5 * WEI, -400),
            sample_bid(S3, "0xb3", BEAVER_KEY, 1.0 * WEI, -100),
            sample_bid(S5, "0xb6", BEAVER_KEY, 0.9 * WEI, -100),
        ],
    );
    write_bids(
        &bids_dir.join("20230410.parquet"),
        &[
            sample_bid(T1, &hash_of(T1), TITAN_KEY, 1.0 * WEI, 1_500),
            sample_bid(T1, "0xb4", BEAVER_KEY, 0.9 * WEI, -100),
            sample_bid(T1, "0xb5", BEAVER_KEY, 0.95 * WEI, 1_000),
        ],
    );

    let config = RunConfig {
        db_path: dir.path().join("results.sqlite"),
        private_transactions_path: dir.path().join("private_txs.parquet"),
        blocks_path: dir.path().join("blocks.parquet"),
        bids_dir,
        data_dir,
    };
    Fixture { _dir: dir, config }
}

fn record(date: &str, slot: u64, value: f64, provider: &str, profit: f64) -> PivotalProviderRecord {
    PivotalProviderRecord {
        date: date.to_string(),
        number: number_of(slot),
        slot,
        value,
        winner: "Titan".to_string(),
        provider: provider.to_string(),
        profit,
    }
}

#[test]
fn run_writes_pivotal_providers_per_date() {
    let fixture = two_day_fixture();
    let reference = ReferenceData::load(&fixture.config.data_dir).expect("load reference data");
    let mut sink = SqliteSink::recreate(&fixture.config.db_path).expect("create sink");

    let summary = run(&fixture.config, &reference, &mut sink).expect("run succeeds");

    assert_eq!(summary.dates, 2);
    assert_eq!(summary.slots_evaluated, 4, "S3 has no builder, S4 has no bids");
    assert_eq!(summary.slots_without_competitor, 1, "S2 only has the winner's own bids");
    assert_eq!(summary.slots_missing_values, 1, "S5 has no block value");
    assert_eq!(summary.records, 3);

    let searcher_label = format!("Searcher: {}", SEARCHER.to_lowercase());
    let stored = sink.records().expect("read back records");
    assert_eq!(
        stored,
        vec![
            record("20230409", S1, 15.0 * WEI, "MEV-Share", 6.0 * WEI),
            record("20230409", S1, 15.0 * WEI, &searcher_label, 5.5 * WEI),
            record("20230410", T1, 2.0 * WEI, "Unibot", 1.08 * WEI),
        ]
    );

    assert_eq!(summary.providers["MEV-Share"].pivotal_slots, 1);
    assert!(
        !summary.providers.contains_key("Maestro"),
        "15 - 2 = 13 stays above the 10 ETH runner-up"
    );
}

#[test]
fn bid_after_winning_bid_time_counts_as_competitor() {
    // Day two only turns pivotal because the 0.95 ETH bid landed before the
    // winning bid surfaced at +1.5s.
    let fixture = two_day_fixture();
    let reference = ReferenceData::load(&fixture.config.data_dir).expect("load reference data");
    let mut records: Vec<PivotalProviderRecord> = Vec::new();

    run(&fixture.config, &reference, &mut records).expect("run succeeds");

    let unibot: Vec<_> = records.iter().filter(|r| r.provider == "Unibot").collect();
    assert_eq!(unibot.len(), 1);
    assert_eq!(unibot[0].slot, T1);
}

#[test]
fn missing_bid_file_is_fatal_and_keeps_earlier_dates() {
    let fixture = two_day_fixture();
    std::fs::remove_file(fixture.config.bids_dir.join("20230410.parquet"))
        .expect("remove day two bids");
    let reference = ReferenceData::load(&fixture.config.data_dir).expect("load reference data");
    let mut sink = SqliteSink::recreate(&fixture.config.db_path).expect("create sink");

    let err = run(&fixture.config, &reference, &mut sink).expect_err("day two has no bids");
    assert!(
        err.chain().any(|cause| cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == ErrorKind::NotFound)),
        "NotFound should stay in the chain: {err:?}"
    );
    assert!(format!("{err:?}").contains("20230410"));

    let stored = sink.records().expect("read back records");
    assert_eq!(stored.len(), 2, "2023-04-09 was committed before the failure");
    assert!(stored.iter().all(|r| r.date == "20230409"));
}

#[test]
fn rerun_after_recreate_does_not_duplicate() {
    let fixture = two_day_fixture();
    let reference = ReferenceData::load(&fixture.config.data_dir).expect("load reference data");

    for _ in 0..2 {
        let mut sink = SqliteSink::recreate(&fixture.config.db_path).expect("create sink");
        run(&fixture.config, &reference, &mut sink).expect("run succeeds");
    }

    let sink = SqliteSink::recreate(&fixture.config.db_path).expect("reopen sink");
    assert!(sink.records().expect("read back").is_empty(), "recreate truncates");

    let mut sink = SqliteSink::recreate(&fixture.config.db_path).expect("create sink");
    run(&fixture.config, &reference, &mut sink).expect("run succeeds");
    run(&fixture.config, &reference, &mut sink).expect("second run appends");
    assert_eq!(sink.records().expect("read back").len(), 6, "append accumulates");
}

#[test]
fn missing_required_column_names_it() {
    let fixture = two_day_fixture();
    write_parquet(
        &fixture.config.blocks_path,
        vec![("slot", col(arrow::array::UInt64Array::from(vec![S1])))],
    );
    let reference = ReferenceData::load(&fixture.config.data_dir).expect("load reference data");
    let mut records: Vec<PivotalProviderRecord> = Vec::new();

    let err = run(&fixture.config, &reference, &mut records).expect_err("blocks lack columns");
    assert!(format!("{err:?}").contains("number"), "{err:?}");
}
