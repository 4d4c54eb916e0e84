//! Engine error taxonomy.
//!
//! Every variant is an invalid-input failure: the engine returns no partial
//! result. A run that produces no trades is not an error.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::PriceField;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("empty bar series")]
    EmptySeries,

    #[error("invalid {field} price at bar {index}: {value}")]
    InvalidPrice {
        index: usize,
        field: PriceField,
        value: f64,
    },

    #[error("high below low at bar {index} (high={high}, low={low})")]
    InvertedRange { index: usize, high: f64, low: f64 },

    #[error("timestamps not strictly ascending at bar {index}: {previous} then {current}")]
    NonMonotonicTimestamp {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}
