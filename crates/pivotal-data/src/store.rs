//! SQLite sink for pivotal-provider records.
//!
//! Every append opens the database, writes one date's records inside a single
//! transaction and closes the connection again. A crash mid-run therefore
//! loses at most the date being written; earlier dates stay committed.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use rusqlite::Connection;

use crate::types::PivotalProviderRecord;

/// Destination for the records of one processed date.
pub trait RecordSink {
    /// Durably appends `records` for `date`, returning the number written.
    ///
    /// # Errors
    /// Returns error if the records could not be persisted.
    fn append(&mut self, date: &str, records: &[PivotalProviderRecord]) -> Result<usize>;
}

impl RecordSink for Vec<PivotalProviderRecord> {
    fn append(&mut self, _date: &str, records: &[PivotalProviderRecord]) -> Result<usize> {
        self.extend_from_slice(records);
        Ok(records.len())
    }
}

/// `pivotal_providers` table in a SQLite database file.
#[derive(Clone, Debug)]
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    /// Drops and re-creates the `pivotal_providers` table.
    ///
    /// Appends are not idempotent, so a run starts from an empty table.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or the schema fails.
    pub fn recreate(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open(&path)?;
        conn.execute_batch(
            "
            DROP TABLE IF EXISTS pivotal_providers;
            CREATE TABLE pivotal_providers (
                date TEXT,
                number INTEGER,
                slot INTEGER,
                value FLOAT,
                winner TEXT,
                provider TEXT,
                profit FLOAT
            );
            ",
        )
        .wrap_err("failed to create pivotal_providers table")?;
        conn.close()
            .map_err(|(_, e)| e)
            .wrap_err("failed to close SQLite connection")?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all stored records back in insertion order.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn records(&self) -> Result<Vec<PivotalProviderRecord>> {
        let conn = open(&self.path)?;
        let mut stmt = conn.prepare(
            "SELECT date, number, slot, value, winner, provider, profit
             FROM pivotal_providers ORDER BY rowid",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(PivotalProviderRecord {
                    date: row.get(0)?,
                    number: row.get(1)?,
                    slot: row.get(2)?,
                    value: row.get(3)?,
                    winner: row.get(4)?,
                    provider: row.get(5)?,
                    profit: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn open(path: &Path) -> Result<Connection> {
    Connection::open(path)
        .wrap_err_with(|| format!("failed to open SQLite database {}", path.display()))
}

impl RecordSink for SqliteSink {
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    fn append(&mut self, date: &str, records: &[PivotalProviderRecord]) -> Result<usize> {
        let mut conn = open(&self.path)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO pivotal_providers (
                    date, number, slot, value, winner, provider, profit
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for r in records {
                stmt.execute(rusqlite::params![
                    r.date, r.number, r.slot, r.value, r.winner, r.provider, r.profit,
                ])?;
            }
        }
        tx.commit()
            .wrap_err_with(|| format!("failed to commit records for {date}"))?;
        conn.close()
            .map_err(|(_, e)| e)
            .wrap_err("failed to close SQLite connection")?;
        Ok(records.len())
    }
}
