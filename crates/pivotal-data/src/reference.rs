//! Read-only reference tables: known searcher addresses and builder aliases.
//!
//! Both are loaded once at startup. Any malformation is fatal since the
//! attribution and identity rules cannot run without them.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use eyre::{eyre, Context, Result};

/// File name of the searcher address table inside the data folder.
pub const SEARCHERS_FILE: &str = "searchers.csv";

/// File name of the builder alias table inside the data folder.
pub const BUILDERS_FILE: &str = "builders.json";

/// Length of the raw-key label used for builders without an alias.
pub const UNKNOWN_BUILDER_PREFIX_LEN: usize = 12;

/// Set of known searcher addresses, stored lowercase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Searchers {
    addresses: HashSet<String>,
}

impl Searchers {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            addresses: addresses
                .into_iter()
                .map(|a| a.as_ref().trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(&address.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Parses a comma-separated table with an `address` header column.
    ///
    /// # Errors
    /// Returns error if the header is missing or has no `address` column.
    pub fn parse_csv(content: &str) -> Result<Self> {
        let mut records = csv_records(content).into_iter();
        let header = records
            .next()
            .ok_or_else(|| eyre!("searcher table is empty, expected an address header"))?;
        let address_idx = header
            .iter()
            .position(|name| name.trim().eq_ignore_ascii_case("address"))
            .ok_or_else(|| {
                eyre!("searcher table has no address column: {}", header.join(","))
            })?;

        let mut addresses = Vec::new();
        for (row, record) in records.enumerate() {
            match record.get(address_idx).map(|field| field.trim()) {
                Some(address) if !address.is_empty() => addresses.push(address.to_string()),
                _ => tracing::debug!(row = row + 1, "skipping row without address"),
            }
        }
        Ok(Self::new(addresses))
    }

    /// Reads and parses a searcher table from disk.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read searcher table {}", path.display()))?;
        Self::parse_csv(&content)
            .wrap_err_with(|| format!("malformed searcher table {}", path.display()))
    }
}

/// Splits RFC 4180 text into records.
///
/// Quoted fields may hold commas, line breaks and `""` escapes. A leading
/// byte-order mark and blank lines are skipped.
fn csv_records(content: &str) -> Vec<Vec<String>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().any(|field| !field.trim().is_empty()) {
        records.push(record);
    }
}

/// Mapping from raw builder public key to canonical builder name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuilderAliases {
    by_pubkey: HashMap<String, String>,
}

impl BuilderAliases {
    /// Inverts a `name -> [pubkey, ...]` table into `pubkey -> name`.
    ///
    /// A key listed under several names resolves to the name that sorts last,
    /// so the result does not depend on map iteration order.
    pub fn from_names(names: HashMap<String, Vec<String>>) -> Self {
        let mut entries: Vec<_> = names.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut by_pubkey = HashMap::new();
        for (name, pubkeys) in entries {
            for pubkey in pubkeys {
                by_pubkey.insert(pubkey, name.clone());
            }
        }
        Self { by_pubkey }
    }

    /// Parses the JSON alias table.
    ///
    /// # Errors
    /// Returns error unless the document is an object of string arrays.
    pub fn parse_json(content: &str) -> Result<Self> {
        let names: HashMap<String, Vec<String>> = serde_json::from_str(content)
            .wrap_err("builder table must be an object of {name: [pubkey, ...]}")?;
        Ok(Self::from_names(names))
    }

    /// Reads and parses the alias table from disk.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read builder table {}", path.display()))?;
        Self::parse_json(&content)
            .wrap_err_with(|| format!("malformed builder table {}", path.display()))
    }

    /// Canonical name for `pubkey`, or its first 12 characters when unmapped.
    pub fn resolve(&self, pubkey: &str) -> String {
        match self.by_pubkey.get(pubkey) {
            Some(name) => name.clone(),
            None => pubkey.chars().take(UNKNOWN_BUILDER_PREFIX_LEN).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_pubkey.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pubkey.is_empty()
    }
}

/// All reference data a run needs, built once and passed by reference.
#[derive(Clone, Debug, Default)]
pub struct ReferenceData {
    pub searchers: Searchers,
    pub builders: BuilderAliases,
}

impl ReferenceData {
    /// Loads `searchers.csv` and `builders.json` from `data_dir`.
    ///
    /// # Errors
    /// Returns error if either table is missing or malformed.
    #[tracing::instrument(skip_all, fields(data_dir = %data_dir.display()))]
    pub fn load(data_dir: &Path) -> Result<Self> {
        let searchers = Searchers::load(&data_dir.join(SEARCHERS_FILE))?;
        let builders = BuilderAliases::load(&data_dir.join(BUILDERS_FILE))?;
        tracing::info!(
            searchers = searchers.len(),
            builder_keys = builders.len(),
            "loaded reference tables"
        );
        Ok(Self { searchers, builders })
    }
}
