//! Progress cursor storage trait.

use crate::StoreError;
use chainwatch_types::BlockHeight;

/// Height of the last fully processed block.
pub trait CursorStore {
    /// The progress cursor, or `0` if no block has been processed yet.
    fn current_block(&self) -> Result<BlockHeight, StoreError>;

    /// Overwrite the progress cursor.
    ///
    /// Monotonicity is the caller's responsibility; the store simply
    /// records whatever it is given.
    fn save_block(&self, height: BlockHeight) -> Result<(), StoreError>;
}
