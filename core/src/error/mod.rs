//! Public error types for tablo.
//!
//! Store and registry errors are synchronous contract violations returned to the immediate caller.
//! Mutation errors are additionally reported through the notifier by the coordinator.

use thiserror::Error;

use crate::record::RecordId;

/// Error type for Entity Store operations.
///
/// Returned from: `EntityStore::create`, `update`, `delete`, `toggle`, `load`
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists
    #[error("duplicate id: {0}")]
    DuplicateId(RecordId),

    /// No record with this id
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// Toggle target holds a non-boolean value
    #[error("field '{field}' of {id} is not a boolean")]
    NotBoolean { id: RecordId, field: String },

    /// The data source failed to produce the initial collection
    #[error("data source failed: {0:#}")]
    Source(anyhow::Error),
}

/// Error type for Comparator Registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    /// The sort key was never registered. Indicates a mismatch between the view and its registry.
    #[error("unknown sort key: {0}")]
    UnknownSortKey(String),
}

/// Error type for operations submitted to the Mutation Coordinator.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Another request for the same record is still in flight
    #[error("conflict: a change to {0} is already pending")]
    Conflict(RecordId),

    /// Delete refused because other records still depend on this one
    #[error("{id} has {count} dependent records")]
    HasDependents { id: RecordId, count: i64 },

    /// Delete refused because the dependent count field holds something that is not a number
    #[error("dependent count '{field}' of {id} is not a number: {value}")]
    UnreadableDependents { id: RecordId, field: String, value: String },

    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("duplicate id: {0}")]
    DuplicateId(RecordId),

    #[error("field '{field}' of {id} is not a boolean")]
    NotBoolean { id: RecordId, field: String },

    /// The mutation executor reported failure; the optimistic change was rolled back
    #[error("rejected: {0}")]
    Rejected(String),
}

impl MutationError {
    /// The message shown to the user. Known causes are explained; anything else gets a generic message.
    pub fn user_message(&self) -> String {
        match self {
            MutationError::Conflict(id) => format!("Another change to {id} is still being saved. Please wait for it to finish."),
            MutationError::HasDependents { id, count } => {
                format!("{id} cannot be deleted while {count} dependent records are assigned to it.")
            }
            MutationError::UnreadableDependents { id, .. } => format!("{id} cannot be deleted because its dependent records could not be counted."),
            MutationError::NotFound(id) => format!("{id} no longer exists."),
            MutationError::DuplicateId(id) => format!("A record with id {id} already exists."),
            MutationError::NotBoolean { field, .. } => format!("'{field}' cannot be toggled."),
            MutationError::Rejected(_) => "The change could not be saved. Please try again.".to_string(),
        }
    }
}

impl From<StoreError> for MutationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => MutationError::DuplicateId(id),
            StoreError::NotFound(id) => MutationError::NotFound(id),
            StoreError::NotBoolean { id, field } => MutationError::NotBoolean { id, field },
            StoreError::Source(err) => MutationError::Rejected(format!("{err:#}")),
        }
    }
}

/// Error type for loading and validating [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
