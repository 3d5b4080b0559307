use clap::Parser;
use color_eyre::eyre::{Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use pivotal_analysis::pivotal::WEI_PER_ETH;
use pivotal_analysis::{run, RunConfig, RunSummary};
use pivotal_data::{ReferenceData, SqliteSink};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pivotal-providers")]
#[command(about = "Identify order-flow providers pivotal to winning a block auction")]
#[command(version)]
struct Cli {
    /// SQLite database to (re)create and write results into.
    #[arg(long)]
    db_path: PathBuf,

    /// Parquet archive of private transactions.
    #[arg(long)]
    private_transactions_path: PathBuf,

    /// Parquet archive of proposed blocks.
    #[arg(long)]
    blocks_path: PathBuf,

    /// Directory of daily bid archives named `YYYYMMDD.parquet`.
    #[arg(long)]
    bids_folder_path: PathBuf,

    /// Directory holding `searchers.csv` and `builders.json`.
    #[arg(long)]
    data_folder_path: PathBuf,
}

impl From<Cli> for RunConfig {
    fn from(cli: Cli) -> Self {
        Self {
            db_path: cli.db_path,
            private_transactions_path: cli.private_transactions_path,
            blocks_path: cli.blocks_path,
            bids_dir: cli.bids_folder_path,
            data_dir: cli.data_folder_path,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let config = RunConfig::from(Cli::parse());
    init_tracing()?;

    let reference = ReferenceData::load(&config.data_dir)?;
    let mut sink = SqliteSink::recreate(&config.db_path)?;
    info!(db_path = %config.db_path.display(), "recreated results table");

    let summary = run(&config, &reference, &mut sink)
        .wrap_err("pivotal provider identification failed")?;
    print_summary(&summary);
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(Level::INFO.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn format_eth(wei: f64) -> String {
    format!("{:.6} ETH", wei / WEI_PER_ETH)
}

fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{} dates, {} slots analysed, {} without a competing bid, {} missing block values, {} records",
        summary.dates,
        summary.slots_evaluated,
        summary.slots_without_competitor,
        summary.slots_missing_values,
        summary.records
    )
}

fn print_summary(summary: &RunSummary) {
    println!("{}", summary_line(summary));
    if summary.providers.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Provider", "Pivotal Slots", "Pivotal Profit"]);
    for (provider, tally) in &summary.providers {
        table.add_row(vec![
            provider.clone(),
            tally.pivotal_slots.to_string(),
            format_eth(tally.pivotal_profit),
        ]);
    }
    println!("{table}");
}
