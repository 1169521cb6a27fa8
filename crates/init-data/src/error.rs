//! Launch data errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitDataError {
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Malformed launch data: {0}")]
    MalformedPayload(String),

    #[error("Launch data signature does not match")]
    InvalidSignature,

    #[error("Launch data expired: issued {age}s ago, limit is {limit}s")]
    Expired { age: i64, limit: i64 },
}
