//! Domain model for clusters, their configurations and selection mappings.
//!
//! # Invariants
//! - Persisted rows are identified by storage-assigned numeric ids; a model
//!   value with `None` id has never been written.
//! - Every write path runs the model's `validate()` first.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod cluster;
pub mod config;
pub mod stack;

/// Longest cluster name accepted by the `clusters.cluster_name` column.
pub const MAX_CLUSTER_NAME_CHARS: usize = 100;

/// Validation failures raised before any SQL mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyClusterName,
    ClusterNameTooLong { chars: usize },
    EmptyField(&'static str),
    InvalidConfigVersion(i64),
    InvalidJsonObject { field: &'static str, reason: String },
    InvalidStackId(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyClusterName => write!(f, "cluster name cannot be empty"),
            Self::ClusterNameTooLong { chars } => write!(
                f,
                "cluster name has {chars} characters; at most {MAX_CLUSTER_NAME_CHARS} allowed"
            ),
            Self::EmptyField(field) => write!(f, "`{field}` cannot be empty"),
            Self::InvalidConfigVersion(version) => {
                write!(f, "config version must be >= 1, got {version}")
            }
            Self::InvalidJsonObject { field, reason } => {
                write!(f, "`{field}` must be a JSON object: {reason}")
            }
            Self::InvalidStackId(value) => {
                write!(f, "invalid stack id `{value}`; expected NAME-VERSION")
            }
        }
    }
}

impl Error for ModelValidationError {}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

pub(crate) fn require_non_empty(
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::EmptyField(field));
    }
    Ok(())
}
