use std::io;

use thiserror::Error;

/// Failure to emit a resolved problem.
///
/// Nothing is written to the sink for `Serialize` and `InvalidStatus`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ResolveError {
    /// The problem payload could not be encoded as JSON
    #[error("failed to serialize problem details: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The problem carries a status that is not a valid HTTP status code
    #[error("problem status {0} is not a valid HTTP status code")]
    InvalidStatus(u16),

    /// The response sink rejected the body
    #[error("failed to write problem details: {0}")]
    Write(#[source] io::Error),
}
