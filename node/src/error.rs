use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] chainwatch_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] chainwatch_store_lmdb::LmdbError),

    #[error("ledger source error: {0}")]
    Source(#[from] chainwatch_source::SourceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walker task failed: {0}")]
    WalkerTask(String),
}
