//! Metadata table: schema version and the progress cursor live here.

use crate::{LmdbError, LmdbStore};

pub(crate) const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
pub(crate) const PROGRESS_CURSOR_KEY: &[u8] = b"progress_cursor";

impl LmdbStore {
    /// Store a raw metadata value.
    pub fn put_meta(&self, key: &[u8], value: &[u8]) -> Result<(), LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        self.meta_db.put(&mut wtxn, key, value)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Retrieve a raw metadata value, `None` if absent.
    pub fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.meta_db.get(&rtxn, key)?.map(|v| v.to_vec()))
    }

    /// Stored schema version; `0` for a fresh database.
    pub fn schema_version(&self) -> Result<u32, LmdbError> {
        match self.get_meta(SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".into())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_schema_version(&self, version: u32) -> Result<(), LmdbError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}
