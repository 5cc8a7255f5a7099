use std::path::{Path, PathBuf};

use errorbase_core::{ErrorRecord, RecordId};
use errorbase_store_sqlite::{SqliteStore, StoreError};
use http::StatusCode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DB_PATH: &str = "/app/data/errors.db";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("error record {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Validation(err) => Self::InvalidInput(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients. Storage details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(_) | Self::NotFound(_) => self.to_string(),
            Self::Store(_) => "Internal server error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddErrorRequest {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub tickets: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteErrorRequest {
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub results: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddErrorResponse {
    pub success: bool,
    pub message: String,
    pub uuid: RecordId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapReport {
    pub seeded: Option<RecordId>,
    pub records: u64,
}

#[derive(Debug, Clone)]
pub struct ErrorBaseApi {
    db_path: PathBuf,
}

impl ErrorBaseApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open_store(&self) -> Result<SqliteStore, ApiError> {
        let store = SqliteStore::open(&self.db_path)?;
        store.ensure_initialized()?;
        Ok(store)
    }

    /// Create the schema if needed and seed the placeholder record into a never-seeded,
    /// empty store. Run once before serving traffic.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened, initialized, or seeded.
    pub fn bootstrap(&self) -> Result<BootstrapReport, ApiError> {
        let store = self.open_store()?;
        let seeded = store.seed_if_empty()?.map(|record| record.id().clone());
        Ok(BootstrapReport { seeded, records: store.record_count()? })
    }

    /// Title substring search. A missing or blank query yields no results.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn search(&self, input: SearchRequest) -> Result<SearchResponse, ApiError> {
        let query = input.query.unwrap_or_default();
        if query.trim().is_empty() {
            return Ok(SearchResponse { results: Vec::new() });
        }

        let results = self.open_store()?.search(&query)?;
        Ok(SearchResponse { results })
    }

    /// Create one record under a freshly generated id.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidInput`] when `error` or `description` is missing or
    /// blank (nothing is written), or a store error when the insert fails.
    pub fn add(&self, input: AddErrorRequest) -> Result<AddErrorResponse, ApiError> {
        let title = required_field(input.error, "error")?;
        let description = required_field(input.description, "description")?;

        let record = ErrorRecord::new(RecordId::generate(), title, description)
            .map_err(|err| ApiError::InvalidInput(err.to_string()))?
            .with_resolution(input.solution.unwrap_or_default())
            .with_tickets(input.tickets.unwrap_or_default())
            .with_tasks(input.tasks.unwrap_or_default());

        self.open_store()?.add(&record)?;
        Ok(AddErrorResponse {
            success: true,
            message: "Error record added".to_string(),
            uuid: record.id().clone(),
        })
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for a missing `uuid`, [`ApiError::NotFound`]
    /// for an unknown one, or a store error.
    pub fn delete(&self, input: DeleteErrorRequest) -> Result<DeleteErrorResponse, ApiError> {
        let id = RecordId::from(required_field(input.uuid, "uuid")?);
        self.open_store()?.delete(&id)?;
        Ok(DeleteErrorResponse { success: true, message: "Error record deleted".to_string() })
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn all(&self) -> Result<SearchResponse, ApiError> {
        let results = self.open_store()?.get_all()?;
        Ok(SearchResponse { results })
    }

    /// # Errors
    /// Returns an error when the store cannot be read. An unknown id is `Ok(None)`.
    pub fn get(&self, id: &str) -> Result<Option<ErrorRecord>, ApiError> {
        Ok(self.open_store()?.get(&RecordId::from(id))?)
    }
}

fn required_field(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::InvalidInput(format!("field '{name}' is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("errorbase-api-{}", uuid::Uuid::new_v4()))
            .join("errors.db")
    }

    fn cleanup(api: &ErrorBaseApi) {
        if let Some(dir) = api.db_path().parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    fn bootstrapped_api() -> Result<ErrorBaseApi> {
        let api = ErrorBaseApi::new(unique_temp_db_path());
        api.bootstrap()?;
        Ok(api)
    }

    fn add_request(error: &str, description: &str) -> AddErrorRequest {
        AddErrorRequest {
            error: Some(error.to_string()),
            description: Some(description.to_string()),
            ..AddErrorRequest::default()
        }
    }

    #[test]
    fn bootstrap_seeds_once() -> Result<()> {
        let api = ErrorBaseApi::new(unique_temp_db_path());

        let first = api.bootstrap()?;
        assert!(first.seeded.is_some());
        assert_eq!(first.records, 1);

        let second = api.bootstrap()?;
        assert_eq!(second.seeded, None);
        assert_eq!(second.records, 1);

        cleanup(&api);
        Ok(())
    }

    #[test]
    fn add_then_search_and_get() -> Result<()> {
        let api = bootstrapped_api()?;
        let added = api.add(AddErrorRequest {
            solution: Some("guard against null".to_string()),
            tickets: Some(vec!["INC-7".to_string(), "INC-3".to_string()]),
            ..add_request("NullPointerException", "npe on null arg")
        })?;
        assert!(added.success);

        let found = api.search(SearchRequest { query: Some("NULLPOINTER".to_string()) })?;
        assert_eq!(found.results.len(), 1);
        assert_eq!(found.results[0].id(), &added.uuid);
        assert_eq!(found.results[0].resolution(), "guard against null");
        assert_eq!(found.results[0].tickets(), ["INC-7".to_string(), "INC-3".to_string()]);
        assert!(found.results[0].tasks().is_empty());

        let fetched = api
            .get(added.uuid.as_str())?
            .unwrap_or_else(|| panic!("added record should be retrievable"));
        assert_eq!(fetched, found.results[0]);

        cleanup(&api);
        Ok(())
    }

    #[test]
    fn missing_or_blank_query_returns_no_results() -> Result<()> {
        let api = bootstrapped_api()?;

        assert!(api.search(SearchRequest::default())?.results.is_empty());
        assert!(api.search(SearchRequest { query: Some("  ".to_string()) })?.results.is_empty());

        cleanup(&api);
        Ok(())
    }

    #[test]
    fn add_without_description_is_rejected_and_not_persisted() -> Result<()> {
        let api = bootstrapped_api()?;
        let before = api.all()?.results.len();

        let err = api.add(AddErrorRequest {
            error: Some("Timeout".to_string()),
            ..AddErrorRequest::default()
        });
        assert!(
            matches!(&err, Err(ApiError::InvalidInput(message)) if message.contains("description"))
        );

        let blank = api.add(add_request("   ", "desc"));
        assert!(matches!(&blank, Err(err) if err.status_code() == StatusCode::BAD_REQUEST));

        assert_eq!(api.all()?.results.len(), before);
        cleanup(&api);
        Ok(())
    }

    #[test]
    fn delete_reports_missing_and_unknown_ids() -> Result<()> {
        let api = bootstrapped_api()?;
        let added = api.add(add_request("DiskFull", "no space left"))?;

        let missing = api.delete(DeleteErrorRequest::default());
        assert!(matches!(&missing, Err(err) if err.status_code() == StatusCode::BAD_REQUEST));

        let unknown = api.delete(DeleteErrorRequest { uuid: Some("nope".to_string()) });
        assert!(matches!(&unknown, Err(err) if err.status_code() == StatusCode::NOT_FOUND));

        let deleted = api.delete(DeleteErrorRequest { uuid: Some(added.uuid.to_string()) })?;
        assert!(deleted.success);
        assert_eq!(api.get(added.uuid.as_str())?, None);

        cleanup(&api);
        Ok(())
    }

    #[test]
    fn store_errors_hide_details_from_clients() {
        let err = ApiError::from(StoreError::DuplicateId("abc".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");

        let not_found = ApiError::from(StoreError::NotFound("abc".to_string()));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert!(not_found.public_message().contains("abc"));
    }
}
