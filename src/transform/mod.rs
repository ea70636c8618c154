//! Value-transform helpers invoked by attribute definitions
//!
//! Pure functions over attribute values: declarative match-and-substitute
//! rules ([`ValueMap`]) and scoping ([`scope::attach_scope`]). These are
//! exercised by the resolution engine but know nothing about the graph.

mod scope;
mod value_map;

pub use scope::attach_scope;
pub use value_map::{ValueMap, ValueRule};

use thiserror::Error;

use crate::attribute::AttributeValue;

/// Errors raised by transform helpers
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid match pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("expected a string-typed value, got {actual}")]
    TypeMismatch { actual: &'static str },
}

/// Extract the string content of a value, rejecting non-string types.
///
/// Scoped values are already qualified; re-transforming them is a type
/// mismatch just like binary values.
pub(crate) fn expect_string(value: &AttributeValue) -> Result<&str, TransformError> {
    match value {
        AttributeValue::Str(s) => Ok(s),
        AttributeValue::Scoped { .. } => Err(TransformError::TypeMismatch { actual: "scoped" }),
        AttributeValue::Bytes(_) => Err(TransformError::TypeMismatch { actual: "bytes" }),
    }
}
