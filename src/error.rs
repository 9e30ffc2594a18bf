use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::TaskId;

/// Why a recurrence rule string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("recurrence rule is empty")]
    Empty,
    #[error("unknown frequency '{0}' (expected daily, weekly or monthly)")]
    UnknownFrequency(String),
    #[error("'{0}' is not a weekday name")]
    InvalidWeekday(String),
    #[error("'{0}' is not a day of month (expected 1-31 or 'last')")]
    InvalidDayOfMonth(String),
    #[error("{frequency} rule needs a parameter")]
    MissingParameter { frequency: &'static str },
    #[error("unexpected parameter '{param}' for {frequency} rule")]
    UnexpectedParameter { frequency: &'static str, param: String },
}

/// Failures raised by a task repository.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("an instance of task {parent_id} due {due_date} already exists")]
    Conflict { parent_id: TaskId, due_date: NaiveDate },
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(#[from] RuleParseError),
    #[error("no owner configured; set CADENCE_OWNER")]
    NoOwner,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }

    /// True when the error reports a (parent_task_id, due_date) uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Problems loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
