//! Attendance ledger: who has been seen this run, mirrored to storage.

use crate::store::LedgerStore;
use chrono::Local;
use serde::Serialize;
use std::collections::HashSet;

/// Timestamp format of the `Time` column, local time.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub name: String,
    /// `YYYY-MM-DD HH:MM:SS`, kept as the exact string that was loaded or written.
    pub time: String,
}

/// Current local time in [`TIME_FORMAT`].
pub fn now_timestamp() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

/// Keep the first record per name. Later duplicates are dropped with a
/// warning and vanish from storage on the next save.
fn dedup_by_name(loaded: Vec<AttendanceRecord>) -> (Vec<AttendanceRecord>, HashSet<String>) {
    let mut names = HashSet::with_capacity(loaded.len());
    let mut records = Vec::with_capacity(loaded.len());
    for record in loaded {
        if names.insert(record.name.clone()) {
            records.push(record);
        } else {
            tracing::warn!(name = %record.name, time = %record.time, "dropping duplicate ledger row");
        }
    }
    (records, names)
}

/// In-memory attendance table with write-through persistence.
///
/// A name is recorded at most once per ledger lifetime. Every new record
/// rewrites the whole persisted table. Save failures are logged and the
/// in-memory record is kept.
pub struct AttendanceLedger {
    store: Box<dyn LedgerStore + Send>,
    records: Vec<AttendanceRecord>,
    names: HashSet<String>,
    clock: fn() -> String,
}

impl AttendanceLedger {
    /// Load the persisted table. A missing table or a failed load gives an
    /// empty ledger.
    pub fn load(store: impl LedgerStore + Send + 'static) -> Self {
        let records = match store.load() {
            Ok(Some(records)) => {
                tracing::info!(store = %store.describe(), records = records.len(), "loaded attendance ledger");
                records
            }
            Ok(None) => {
                tracing::info!(store = %store.describe(), "no attendance ledger yet, starting empty");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(store = %store.describe(), error = %e, "error loading attendance ledger, starting empty");
                Vec::new()
            }
        };
        let (records, names) = dedup_by_name(records);

        Self {
            store: Box::new(store),
            records,
            names,
            clock: now_timestamp,
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Append a record for `name` unless one exists, then rewrite storage.
    ///
    /// Returns true only when a new record was appended. Taking `&mut self`
    /// makes check, append and persist one step for the caller; share a
    /// ledger across threads behind a `Mutex`.
    pub fn record_if_absent(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }

        let record = AttendanceRecord {
            name: name.to_string(),
            time: (self.clock)(),
        };
        self.names.insert(record.name.clone());
        self.records.push(record);

        match self.store.save(&self.records) {
            Ok(()) => tracing::info!(name, "attendance marked"),
            Err(e) => tracing::error!(
                name,
                store = %self.store.describe(),
                error = %e,
                "attendance marked in memory but not saved"
            ),
        }
        true
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
