// Storage module: write-through persistence of price and match records.

pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::model::{InputRecord, MatchRecord, PriceRecord, StorageError};

/// Each call is durable before it returns; nothing is buffered across records.
pub trait PersistenceSink {
    /// Writes the record's url, price, status and diagnostic.
    fn persist(&mut self, record: &PriceRecord) -> Result<(), StorageError>;

    /// Stores a search match and, when accepted, the candidate URL on the record.
    fn persist_match(
        &mut self,
        index: i64,
        record: &MatchRecord,
        accepted_url: Option<&str>,
    ) -> Result<(), StorageError>;
}

/// Ordered input rows for a pass. Re-read at the start of every pass.
pub trait RecordSource {
    fn load_records(&self) -> Result<Vec<InputRecord>, StorageError>;
}
