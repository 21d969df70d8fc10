//! Tabular persistence for the attendance ledger.
//!
//! The on-disk format is a single worksheet with a `Name` and a `Time`
//! header, one record per row. Every save rewrites the whole file.

use crate::ledger::AttendanceRecord;
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const NAME_COLUMN: &str = "Name";
pub const TIME_COLUMN: &str = "Time";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("read {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("{path} has no worksheet")]
    NoWorksheet { path: PathBuf },
    #[error("{path} is missing the {column} column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("write: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Load/save a table of attendance records.
pub trait LedgerStore {
    /// Read the persisted table. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<AttendanceRecord>>, StoreError>;

    /// Replace the persisted table with `records`.
    fn save(&self, records: &[AttendanceRecord]) -> Result<(), StoreError>;

    /// Where the table lives, for log messages.
    fn describe(&self) -> String;
}

/// Excel workbook store: read with calamine, written with rust_xlsxwriter.
#[derive(Debug, Clone)]
pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn read_err(&self, e: impl std::fmt::Display) -> StoreError {
        StoreError::Read {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

impl LedgerStore for XlsxStore {
    fn load(&self) -> Result<Option<Vec<AttendanceRecord>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| self.read_err(e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| StoreError::NoWorksheet {
                path: self.path.clone(),
            })?
            .map_err(|e| self.read_err(e))?;

        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .map(|r| r.iter().map(|c| cell_text(c).trim().to_string()).collect())
            .unwrap_or_default();
        let column = |name: &'static str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| StoreError::MissingColumn {
                    path: self.path.clone(),
                    column: name,
                })
        };
        let name_col = column(NAME_COLUMN)?;
        let time_col = column(TIME_COLUMN)?;

        let records = rows
            .filter_map(|row| {
                let name = row.get(name_col).map(cell_text).unwrap_or_default();
                if name.trim().is_empty() {
                    return None;
                }
                let time = row.get(time_col).map(cell_text).unwrap_or_default();
                Some(AttendanceRecord { name, time })
            })
            .collect();

        Ok(Some(records))
    }

    fn save(&self, records: &[AttendanceRecord]) -> Result<(), StoreError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, NAME_COLUMN)?;
        sheet.write_string(0, 1, TIME_COLUMN)?;
        for (i, record) in records.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, record.name.as_str())?;
            sheet.write_string(row, 1, record.time.as_str())?;
        }

        // The target is only ever replaced by a complete file.
        let tmp = self.tmp_path();
        let written = workbook
            .save(&tmp)
            .map_err(StoreError::from)
            .and_then(|()| std::fs::rename(&tmp, &self.path).map_err(StoreError::from));
        if written.is_err() {
            if let Err(e) = std::fs::remove_file(&tmp) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %e, "cannot remove temporary ledger file");
                }
            }
        }
        written
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Arc<Mutex<Option<Vec<AttendanceRecord>>>>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`.
    pub fn with_records(records: Vec<AttendanceRecord>) -> Self {
        Self {
            table: Arc::new(Mutex::new(Some(records))),
            fail_saves: false,
        }
    }

    /// Store whose saves always fail, leaving the table untouched.
    pub fn failing() -> Self {
        Self {
            table: Arc::default(),
            fail_saves: true,
        }
    }

    /// Snapshot of the last saved table.
    pub fn saved(&self) -> Option<Vec<AttendanceRecord>> {
        self.table.lock().ok().and_then(|t| t.clone())
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<AttendanceRecord>>, StoreError> {
        let table = self
            .table
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(table.clone())
    }

    fn save(&self, records: &[AttendanceRecord]) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".into()));
        }
        let mut table = self
            .table
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *table = Some(records.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, time: &str) -> AttendanceRecord {
        AttendanceRecord {
            name: name.into(),
            time: time.into(),
        }
    }

    #[test]
    fn test_xlsx_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("attendance.xlsx"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_xlsx_save_then_load_keeps_exact_strings() {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("attendance.xlsx"));
        let records = vec![
            record("Alice", "2024-03-01 09:00:05"),
            record("Bob", "2024-03-01 09:01:59"),
        ];
        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), Some(records));
    }

    #[test]
    fn test_xlsx_empty_table_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("attendance.xlsx"));
        store.save(&[]).unwrap();
        assert_eq!(store.load().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_xlsx_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("attendance.xlsx"));
        store.save(&[record("Old", "2020-01-01 00:00:00")]).unwrap();
        store.save(&[record("New", "2024-01-01 00:00:00")]).unwrap();
        assert_eq!(store.load().unwrap(), Some(vec![record("New", "2024-01-01 00:00:00")]));
        assert!(!dir.path().join("attendance.xlsx.tmp").exists());
    }

    #[test]
    fn test_failed_save_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.xlsx");
        // A non-empty directory at the target makes the rename fail.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let store = XlsxStore::new(&path);
        assert!(store.save(&[record("Ann", "2024-01-01 08:00:00")]).is_err());
        assert!(!store.tmp_path().exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_xlsx_columns_found_by_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Time").unwrap();
        sheet.write_string(0, 1, "Note").unwrap();
        sheet.write_string(0, 2, "Name").unwrap();
        sheet.write_string(1, 0, "2024-05-05 10:00:00").unwrap();
        sheet.write_string(1, 1, "late").unwrap();
        sheet.write_string(1, 2, "Carol").unwrap();
        sheet.write_string(2, 0, "2024-05-05 10:05:00").unwrap();
        workbook.save(&path).unwrap();

        let loaded = XlsxStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded, vec![record("Carol", "2024-05-05 10:00:00")]);
    }

    #[test]
    fn test_xlsx_missing_column_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet().write_string(0, 0, "Name").unwrap();
        workbook.save(&path).unwrap();

        let err = XlsxStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { column: TIME_COLUMN, .. }));
    }

    #[test]
    fn test_xlsx_garbage_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.xlsx");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();
        assert!(XlsxStore::new(&path).load().is_err());
    }

    #[test]
    fn test_memory_store_clones_share_table() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save(&[record("A", "t")]).unwrap();
        assert_eq!(other.saved(), Some(vec![record("A", "t")]));
    }
}
