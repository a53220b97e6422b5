use std::path::PathBuf;

use crate::data::model::EntityId;

/// Errors raised by the trace model, its transforms and comparators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- lookups --
    #[error("{0} not found")]
    NotFound(EntityId),

    #[error("output part '{0}' not found")]
    PartNotFound(String),

    // -- configuration (raised before any traversal) --
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("unknown sizing mode '{0}' (expected pad, trim, fraction or full)")]
    UnknownSizingMode(String),

    #[error("unknown time unit '{0}' (expected s, ms, us or ns)")]
    UnknownTimeUnit(String),

    #[error("invalid parameter {param}: {reason}")]
    InvalidParameter { param: &'static str, reason: String },

    // -- shape / preconditions (abort the current run) --
    #[error("shape mismatch: {left} vs {right}")]
    ShapeMismatch { left: String, right: String },

    #[error("fraction count mismatch between {left} ({left_count}) and {right} ({right_count})")]
    FractionCountMismatch {
        left: EntityId,
        left_count: usize,
        right: EntityId,
        right_count: usize,
    },

    #[error("column '{0}' missing from payload")]
    MissingColumn(String),

    #[error("expected {expected} payload, got {actual}")]
    PayloadKind {
        expected: &'static str,
        actual: &'static str,
    },

    // -- I/O --
    #[error("cannot derive ids from {path}: {reason}")]
    Layout { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(left: impl ToString, right: impl ToString) -> Self {
        Error::ShapeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            param,
            reason: reason.into(),
        }
    }
}
