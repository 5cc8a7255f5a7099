use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum RecordError {
    #[error("validation error: {0}")]
    Validation(String),
}

/// Identifier of one error record.
///
/// Always generated by whoever creates the record (UUID v4), never by the store.
/// Lookups accept any string, so an id read from the wire is wrapped as-is.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One known error with its resolution and linked tickets/tasks.
///
/// The serde names (`uuid`, `error`, `solution`) are the wire names used by the
/// HTTP surface and by existing clients. Deserializing runs the same required-field
/// checks as [`ErrorRecord::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "WireRecord")]
pub struct ErrorRecord {
    #[serde(rename = "uuid")]
    id: RecordId,
    #[serde(rename = "error")]
    title: String,
    description: String,
    #[serde(rename = "solution")]
    resolution: String,
    tickets: Vec<String>,
    tasks: Vec<String>,
}

#[derive(Deserialize)]
struct WireRecord {
    uuid: RecordId,
    error: String,
    description: String,
    #[serde(default)]
    solution: String,
    #[serde(default)]
    tickets: Vec<String>,
    #[serde(default)]
    tasks: Vec<String>,
}

impl TryFrom<WireRecord> for ErrorRecord {
    type Error = RecordError;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        Ok(Self::new(wire.uuid, wire.error, wire.description)?
            .with_resolution(wire.solution)
            .with_tickets(wire.tickets)
            .with_tasks(wire.tasks))
    }
}

impl ErrorRecord {
    /// Build a record with the required fields; optional fields start empty.
    ///
    /// Values are kept exactly as given. Trimming is only used to reject blanks.
    ///
    /// # Errors
    /// Returns [`RecordError::Validation`] when the id, title or description is blank.
    pub fn new(
        id: RecordId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let record = Self::restore(id, title.into(), description.into(), String::new());
        record.validate()?;
        Ok(record)
    }

    /// Rebuild a record from already persisted values without re-checking them.
    ///
    /// Legacy rows may carry a blank description; they stay readable. Anything built
    /// here is still validated again before it is written.
    #[must_use]
    pub fn restore(id: RecordId, title: String, description: String, resolution: String) -> Self {
        Self { id, title, description, resolution, tickets: Vec::new(), tasks: Vec::new() }
    }

    #[must_use]
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    #[must_use]
    pub fn tickets(&self) -> &[String] {
        &self.tickets
    }

    #[must_use]
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    #[must_use]
    pub fn with_tickets(mut self, tickets: Vec<String>) -> Self {
        self.tickets = tickets;
        self
    }

    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Check the required-field invariants.
    ///
    /// # Errors
    /// Returns [`RecordError::Validation`] naming the first blank required field.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.as_str().trim().is_empty() {
            return Err(RecordError::Validation("uuid MUST be provided".to_string()));
        }

        if self.title.trim().is_empty() {
            return Err(RecordError::Validation("error title MUST NOT be empty".to_string()));
        }

        if self.description.trim().is_empty() {
            return Err(RecordError::Validation("description MUST NOT be empty".to_string()));
        }

        Ok(())
    }
}

/// Case-insensitive substring query against record titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    needle: String,
}

impl SearchQuery {
    /// Parse raw user input. A blank query yields `None`: it matches nothing
    /// rather than acting as a wildcard.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self { needle: fold_case(trimmed) })
    }

    /// Case-folded, trimmed query text.
    #[must_use]
    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// Plain containment test, no tokenization or scoring.
    #[must_use]
    pub fn matches(&self, title: &str) -> bool {
        fold_case(title).contains(&self.needle)
    }
}

/// Lowercase one character at a time.
///
/// `str::to_lowercase` is context sensitive (a word-final `Σ` becomes `ς`), which
/// would make a query fold differently from the same letters inside a title.
#[must_use]
pub fn fold_case(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).collect()
}
