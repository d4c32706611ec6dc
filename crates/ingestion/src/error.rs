//! Error types for the ingestion crate.
//!
//! Every error aborts the current unit of work; none is retried or
//! resolved automatically.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use aqms_common::{ChannelKey, EntityKind, Epoch, EpochError, StationKey};
use storage::StoreError;

/// An input value that cannot be represented in the AQMS schema.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Cannot map {entity} field '{field}' with value '{value}': {reason}")]
pub struct MappingError {
    /// Entity being mapped, e.g. "UW.RATT..EHZ"
    pub entity: String,
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl MappingError {
    pub fn new(
        entity: impl fmt::Display,
        field: &'static str,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.to_string(),
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// An enumerated value outside the recognized vocabulary.
    pub fn unrecognized(entity: impl fmt::Display, field: &'static str, value: &str) -> Self {
        Self::new(entity, field, value, "unrecognized value")
    }

    pub fn from_epoch(entity: impl fmt::Display, field: &'static str, err: EpochError) -> Self {
        Self::new(entity, field, &err, "invalid epoch")
    }
}

/// An incoming epoch that cannot be reconciled with stored history
/// without guessing.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Conflicting {kind} epochs for {key}: {detail} (incoming {incoming}; stored {})", fmt_epochs(.stored))]
pub struct ConflictError {
    pub kind: EntityKind,
    pub key: String,
    pub detail: String,
    pub incoming: String,
    pub stored: Vec<Epoch>,
}

fn fmt_epochs(epochs: &[Epoch]) -> String {
    if epochs.is_empty() {
        return "none".to_string();
    }
    epochs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A deletion that would close children the caller did not authorize.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Deleting {station} would affect {}: {reason}", fmt_children(.children))]
pub struct DependencyError {
    pub station: StationKey,
    pub children: Vec<ChannelKey>,
    pub reason: String,
}

fn fmt_children(children: &[ChannelKey]) -> String {
    children
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur while loading, exporting or deleting.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Epoch(#[from] EpochError),

    #[error(transparent)]
    StationXml(#[from] stationxml::StationXmlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IngestionError {
    /// Process exit code for command-line front ends.
    pub fn exit_code(&self) -> i32 {
        match self {
            IngestionError::Mapping(_) => 2,
            IngestionError::Conflict(_) => 3,
            IngestionError::Dependency(_) => 4,
            IngestionError::Store(StoreError::ConcurrentModification) => 5,
            _ => 1,
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
