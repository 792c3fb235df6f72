//! LMDB implementation of CursorStore.

use chainwatch_store::{CursorStore, StoreError};
use chainwatch_types::BlockHeight;

use crate::meta::PROGRESS_CURSOR_KEY;
use crate::{LmdbError, LmdbStore};

impl CursorStore for LmdbStore {
    fn current_block(&self) -> Result<BlockHeight, StoreError> {
        match self.get_meta(PROGRESS_CURSOR_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LmdbError::Serialization("invalid cursor length".into()))?;
                Ok(u64::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn save_block(&self, height: BlockHeight) -> Result<(), StoreError> {
        self.put_meta(PROGRESS_CURSOR_KEY, &height.to_le_bytes())?;
        Ok(())
    }
}
