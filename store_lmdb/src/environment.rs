//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::integrity::{check_data_dir, check_integrity};
use crate::migration::migrate;
use crate::LmdbError;

/// Named databases created inside the environment.
pub(crate) const META_DB: &str = "meta";
pub(crate) const SUBSCRIPTIONS_DB: &str = "subscriptions";
pub(crate) const TRANSACTIONS_DB: &str = "transactions";

const MAX_DBS: u32 = 8;

/// Durable chainwatch store backed by a single LMDB environment.
///
/// Cloning is cheap; all clones share the same environment and handles.
#[derive(Clone)]
pub struct LmdbStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) subscriptions_db: Database<Bytes, Bytes>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create an LMDB environment at `path`.
    ///
    /// Creates the directory if needed, opens every named database, brings the
    /// schema up to date and runs an integrity pass before returning.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        check_data_dir(path).map_err(LmdbError::Schema)?;
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per path by this process and
        // never concurrently mapped with incompatible flags.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(META_DB))?;
        let subscriptions_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(SUBSCRIPTIONS_DB))?;
        let transactions_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(TRANSACTIONS_DB))?;
        wtxn.commit()?;

        let store = Self {
            env: Arc::new(env),
            meta_db,
            subscriptions_db,
            transactions_db,
        };

        migrate(&store)?;

        let report = check_integrity(&store)?;
        if !report.is_healthy() {
            for err in &report.errors {
                tracing::error!(error = %err, "integrity check failed");
            }
            return Err(LmdbError::Schema(format!(
                "{} integrity error(s) in {}",
                report.errors.len(),
                path.display()
            )));
        }
        tracing::info!(
            path = %path.display(),
            databases = report.databases_checked,
            subscriptions = report.subscriptions,
            transactions = report.transactions,
            "opened LMDB store"
        );

        Ok(store)
    }

    /// Force buffered writes to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
