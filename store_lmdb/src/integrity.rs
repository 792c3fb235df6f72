//! LMDB database integrity checks.
//!
//! Run on open to detect corruption early, before the walker starts writing.

use std::path::Path;

use crate::environment::{META_DB, SUBSCRIPTIONS_DB, TRANSACTIONS_DB};
use crate::ledger::split_ledger_key;
use crate::meta::PROGRESS_CURSOR_KEY;
use crate::{LmdbError, LmdbStore};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub subscriptions: u64,
    pub transactions: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total_entries(&self) -> u64 {
        self.subscriptions + self.transactions
    }
}

/// Walk every database and validate the shape of what the store wrote.
///
/// - the progress cursor, if present, is a little-endian `u64`
/// - subscription keys are non-empty
/// - ledger keys carry a length prefix that fits the key and a non-empty
///   address; the hash part may be empty
///
/// Malformed records are collected in the report rather than failing fast,
/// so one run lists every problem.
pub fn check_integrity(store: &LmdbStore) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = store.env.read_txn()?;

    report.databases_checked += 1;
    if let Some(cursor) = store.meta_db.get(&rtxn, PROGRESS_CURSOR_KEY)? {
        if cursor.len() != 8 {
            report.errors.push(format!(
                "database '{META_DB}': progress cursor has {} bytes, expected 8",
                cursor.len()
            ));
        }
    }

    report.databases_checked += 1;
    for entry in store.subscriptions_db.iter(&rtxn)? {
        let (key, _) = entry?;
        report.subscriptions += 1;
        if key.is_empty() {
            report
                .errors
                .push(format!("database '{SUBSCRIPTIONS_DB}': empty address key"));
        }
    }

    report.databases_checked += 1;
    for entry in store.transactions_db.iter(&rtxn)? {
        let (key, _) = entry?;
        report.transactions += 1;
        if split_ledger_key(key).is_none() {
            report.errors.push(format!(
                "database '{TRANSACTIONS_DB}': malformed ledger key {:?}",
                String::from_utf8_lossy(key)
            ));
        }
    }

    Ok(report)
}

/// Check that the data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent or empty) directory. Returns an
/// error if the directory holds files but `data.mdb` is missing, which points
/// at corruption or a misconfigured path.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    let has_entries = std::fs::read_dir(path)
        .map_err(|e| e.to_string())?
        .next()
        .is_some();
    if has_entries && !path.join("data.mdb").exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
