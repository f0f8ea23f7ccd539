use crate::model::{InputRecord, MatchRecord, MatchTier, PriceRecord, RecordStatus, StorageError};
use crate::normalizer::ReferenceList;
use crate::storage::{PersistenceSink, RecordSource};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and runs migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS medicines (
                idx INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT,
                price REAL,
                status TEXT NOT NULL DEFAULT 'pending'
            );

            CREATE TABLE IF NOT EXISTS matches (
                query_name TEXT PRIMARY KEY,
                candidate_name TEXT,
                candidate_url TEXT,
                score REAL NOT NULL,
                tier TEXT NOT NULL,
                matched_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS name_mappings (
                original TEXT PRIMARY KEY,
                normalized_to TEXT NOT NULL
            );
            ",
        )?;

        // columns added after the first schema version
        Self::migrate_add_column_if_missing(&conn, "medicines", "diagnostic", "TEXT")?;
        Self::migrate_add_column_if_missing(&conn, "medicines", "updated_at", "TEXT")?;

        Ok(Self { conn })
    }

    /// Adds the column to the table if it does not exist yet.
    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            let alter_sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
            conn.execute(&alter_sql, [])?;
        }

        Ok(())
    }

    /// Inserts names not seen before; existing rows keep their url and price.
    /// Returns the number of new rows.
    pub fn import_reference_list(&mut self, list: &ReferenceList) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut insert = tx.prepare("INSERT OR IGNORE INTO medicines (name) VALUES (?1)")?;
            for name in &list.names {
                inserted += insert.execute(params![name])?;
            }
            let mut mapping = tx.prepare(
                "INSERT OR REPLACE INTO name_mappings (original, normalized_to) VALUES (?1, ?2)",
            )?;
            for (original, resolved) in &list.remapped {
                mapping.execute(params![original, resolved])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn name_mapping(&self, original: &str) -> Result<Option<String>, StorageError> {
        let mapped = self
            .conn
            .query_row(
                "SELECT normalized_to FROM name_mappings WHERE original = ?1",
                params![original],
                |row| row.get(0),
            )
            .optional()?;
        Ok(mapped)
    }

    pub fn get_record(&self, index: i64) -> Result<Option<PriceRecord>, StorageError> {
        let record = self
            .conn
            .query_row(
                "SELECT idx, name, url, price, status, diagnostic, updated_at
                 FROM medicines WHERE idx = ?1",
                params![index],
                Self::map_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_all_records(&self) -> Result<Vec<PriceRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, name, url, price, status, diagnostic, updated_at
             FROM medicines ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map([], Self::map_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn get_match(&self, query_name: &str) -> Result<Option<MatchRecord>, StorageError> {
        let found = self
            .conn
            .query_row(
                "SELECT query_name, candidate_name, candidate_url, score, tier
                 FROM matches WHERE query_name = ?1",
                params![query_name],
                |row| {
                    let tier: String = row.get(4)?;
                    Ok(MatchRecord {
                        query_name: row.get(0)?,
                        candidate_name: row.get(1)?,
                        candidate_url: row.get(2)?,
                        similarity_score: row.get(3)?,
                        tier: MatchTier::parse(&tier).unwrap_or(MatchTier::NotFound),
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    /// Maps a result row into a `PriceRecord`.
    fn map_record(row: &Row) -> Result<PriceRecord, rusqlite::Error> {
        let status: String = row.get(4)?;
        let updated_at: Option<String> = row.get(6)?;
        let updated_at = updated_at
            .map(|s| s.parse::<DateTime<Utc>>())
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(PriceRecord {
            index: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            price: row.get(3)?,
            status: RecordStatus::parse(&status),
            diagnostic: row.get(5)?,
            updated_at,
        })
    }
}

impl RecordSource for SqliteStorage {
    fn load_records(&self) -> Result<Vec<InputRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT idx, name, url, price FROM medicines ORDER BY idx ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(InputRecord {
                index: row.get(0)?,
                name: row.get(1)?,
                source: row.get(2)?,
                existing_price: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

impl PersistenceSink for SqliteStorage {
    fn persist(&mut self, record: &PriceRecord) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE medicines
             SET url = ?1, price = ?2, status = ?3, diagnostic = ?4, updated_at = ?5
             WHERE idx = ?6",
            params![
                &record.url,
                &record.price,
                record.status.as_str(),
                &record.diagnostic,
                record.updated_at.unwrap_or_else(Utc::now).to_rfc3339(),
                record.index,
            ],
        )?;
        if changed == 0 {
            // dropping the transaction rolls it back
            return Err(StorageError::NotFound);
        }
        tx.commit()?;
        Ok(())
    }

    fn persist_match(
        &mut self,
        index: i64,
        record: &MatchRecord,
        accepted_url: Option<&str>,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO matches
                (query_name, candidate_name, candidate_url, score, tier, matched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &record.query_name,
                &record.candidate_name,
                &record.candidate_url,
                record.similarity_score,
                record.tier.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if let Some(url) = accepted_url {
            let changed = tx.execute(
                "UPDATE medicines SET url = ?1, updated_at = ?2 WHERE idx = ?3",
                params![url, Utc::now().to_rfc3339(), index],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound);
            }
        }
        tx.commit()?;
        Ok(())
    }
}
