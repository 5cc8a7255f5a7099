use std::fs;
use std::path::{Path, PathBuf};

use errorbase_core::{ErrorRecord, RecordError, RecordId, SearchQuery};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const CREATE_SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS errors (
  uuid TEXT PRIMARY KEY,
  error TEXT NOT NULL,
  description TEXT,
  solution TEXT,
  tickets TEXT,
  tasks TEXT
);

CREATE INDEX IF NOT EXISTS idx_error ON errors(error);
";

const SELECT_COLUMNS: &str =
    "SELECT uuid, error, description, solution, tickets, tasks FROM errors";

/// `PRAGMA user_version` value recorded once seeding has been evaluated.
const SEEDED_USER_VERSION: i64 = 1;

pub const SEED_TITLE: &str = "TestError";
pub const SEED_DESCRIPTION: &str = "Test error record used to check that search works.";
pub const SEED_RESOLUTION: &str =
    "This is a placeholder record. Replace it with real error data.";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid record: {0}")]
    Validation(#[from] RecordError),
    #[error("error record {0} already exists")]
    DuplicateId(String),
    #[error("error record {0} not found")]
    NotFound(String),
    #[error("failed to prepare database directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode record lists: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the error database at `path`, creating its parent directory if needed.
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created, the database cannot be
    /// opened, or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }

        Self::configure(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error when `SQLite` cannot allocate the connection.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Self { conn })
    }

    /// Create the `errors` table and its title index when absent. Safe on every start.
    ///
    /// # Errors
    /// Returns an error when the schema cannot be created.
    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(())
    }

    /// # Errors
    /// Returns an error when the table cannot be queried.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let exists: bool =
            self.conn.query_row("SELECT EXISTS(SELECT 1 FROM errors)", [], |row| row.get(0))?;
        Ok(!exists)
    }

    /// # Errors
    /// Returns an error when the table cannot be queried.
    pub fn record_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM errors", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Insert one new record. The id is supplied by the caller.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateId`] when the id is taken (the stored row is left
    /// untouched), [`StoreError::Validation`] for an invalid record, or a storage error.
    pub fn add(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        insert_record(&self.conn, record)?;
        tracing::info!(uuid = %record.id(), title = %record.title(), "error record added");
        Ok(())
    }

    /// Remove the record with `id`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when no record has this id, or a storage error.
    pub fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let removed =
            self.conn.execute("DELETE FROM errors WHERE uuid = ?1", params![id.as_str()])?;
        if removed == 0 {
            tracing::warn!(uuid = %id, "delete requested for unknown error record");
            return Err(StoreError::NotFound(id.to_string()));
        }

        tracing::info!(uuid = %id, "error record deleted");
        Ok(())
    }

    /// # Errors
    /// Returns an error when the lookup fails. A missing record is `Ok(None)`.
    pub fn get(&self, id: &RecordId) -> Result<Option<ErrorRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE uuid = ?1"),
                params![id.as_str()],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Every record, ordered by title and then id.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read.
    pub fn get_all(&self) -> Result<Vec<ErrorRecord>, StoreError> {
        self.select_ordered(|_| true)
    }

    /// Records whose title contains `query`, ignoring case, ordered by title.
    ///
    /// A blank query returns nothing without touching the database.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read.
    pub fn search(&self, query: &str) -> Result<Vec<ErrorRecord>, StoreError> {
        let Some(query) = SearchQuery::parse(query) else {
            return Ok(Vec::new());
        };
        self.select_ordered(|title| query.matches(title))
    }

    /// Insert the placeholder record when the store is empty and has never been seeded.
    ///
    /// The seeded marker is kept in `PRAGMA user_version`, so a store that once held
    /// records (even if all were deleted since) is never seeded again.
    ///
    /// The check runs under an immediate write lock, so a second process seeding the
    /// same file waits for the first instead of racing it.
    ///
    /// # Errors
    /// Returns an error when the check or the insert fails; nothing is changed then.
    pub fn seed_if_empty(&self) -> Result<Option<ErrorRecord>, StoreError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let user_version: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if user_version >= SEEDED_USER_VERSION {
            return Ok(None);
        }

        let empty: bool =
            tx.query_row("SELECT NOT EXISTS(SELECT 1 FROM errors)", [], |row| row.get(0))?;
        let seeded = if empty {
            let record = placeholder_record()?;
            insert_record(&tx, &record)?;
            Some(record)
        } else {
            None
        };
        tx.pragma_update(None, "user_version", SEEDED_USER_VERSION)?;
        tx.commit()?;

        if let Some(record) = &seeded {
            tracing::info!(uuid = %record.id(), "seeded placeholder error record");
        }
        Ok(seeded)
    }

    fn select_ordered(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<ErrorRecord>, StoreError> {
        let mut stmt =
            self.conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY error ASC, uuid ASC"))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let title: String = row.get(1)?;
            if keep(&title) {
                records.push(read_record(row)?);
            }
        }

        Ok(records)
    }
}

fn placeholder_record() -> Result<ErrorRecord, RecordError> {
    Ok(ErrorRecord::new(RecordId::generate(), SEED_TITLE, SEED_DESCRIPTION)?
        .with_resolution(SEED_RESOLUTION))
}

fn insert_record(conn: &Connection, record: &ErrorRecord) -> Result<(), StoreError> {
    record.validate()?;

    let result = conn.execute(
        "INSERT INTO errors(uuid, error, description, solution, tickets, tasks)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id().as_str(),
            record.title(),
            record.description(),
            record.resolution(),
            serde_json::to_string(record.tickets())?,
            serde_json::to_string(record.tasks())?,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(StoreError::DuplicateId(record.id().to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<ErrorRecord> {
    let id: String = row.get(0)?;
    let tickets = decode_list(row.get(4)?, &id, "tickets");
    let tasks = decode_list(row.get(5)?, &id, "tasks");

    Ok(ErrorRecord::restore(
        RecordId::from(id),
        row.get(1)?,
        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    )
    .with_tickets(tickets)
    .with_tasks(tasks))
}

/// Stored lists that fail to decode read back as empty instead of failing the row.
fn decode_list(raw: Option<String>, id: &str, column: &str) -> Vec<String> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(values) => values,
        Err(err) => {
            tracing::warn!(
                uuid = id,
                column,
                error = %err,
                "malformed stored list, reading as empty"
            );
            Vec::new()
        }
    }
}
