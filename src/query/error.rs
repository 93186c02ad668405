use thiserror::Error;

use super::types::ParameterType;

/// Raised when a raw parameter value cannot be converted to its declared type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("value cannot be interpreted as a number")]
    NotANumber,

    #[error("value cannot be parsed as a date")]
    InvalidDate,

    #[error("value is not a 24 character hex ObjectId")]
    InvalidObjectId,

    #[error("value cannot be represented as text")]
    NotText,
}

/// Problems with a template definition, raised on create/update
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Query name must be between 2 and 100 characters")]
    InvalidName,

    #[error("Query name '{0}' is reserved")]
    ReservedName(String),

    #[error("Query document must be a JSON object")]
    InvalidQueryDocument,

    #[error("Parameter at position {0} has an empty name")]
    EmptyParameterName(usize),

    #[error("Parameter '{name}' has an invalid pattern: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Parameter '{name}' default value is not a valid {expected}")]
    InvalidDefault { name: String, expected: ParameterType },

    #[error("Placeholder '{{{{{0}}}}}' does not match any declared parameter")]
    UndeclaredPlaceholder(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}
