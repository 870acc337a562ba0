//! DSL parsing errors.

use thiserror::Error;

/// Errors raised while parsing the filter/sort DSL from JSON.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// An `and`/`or` grouping key does not hold a filter object.
    ///
    /// A plain list is rejected explicitly: list order alone cannot
    /// disambiguate sibling keys from values.
    #[error("'{0}' group must hold a filter object, not a list or scalar")]
    MalformedGroup(String),

    /// The filter JSON is structurally unusable.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The sort JSON is structurally unusable.
    #[error("invalid sort: {0}")]
    InvalidSort(String),
}
