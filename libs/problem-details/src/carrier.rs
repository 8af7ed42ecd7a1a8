//! Status carriers: errors (or written responses) that already hold a status code
//!
//! Host frameworks wrap handler errors in their own types that carry an explicit
//! status. A [`CarrierExtractor`] recognizes one such shape and yields the status
//! together with the inner application error, so rule matching runs against the
//! application error instead of the framework wrapper.

use std::error::Error;
use std::sync::Arc;

use http::StatusCode;

use crate::sink::ResponseSink;

/// Status and inner cause pulled out of a carrier.
#[derive(Debug, Clone, Copy)]
pub struct Carried<'e> {
    pub status: StatusCode,
    /// `None` marks a malformed carrier whose cause could not be unwrapped.
    pub cause: Option<&'e (dyn Error + 'static)>,
}

/// Recognizes one carrier shape.
pub trait CarrierExtractor: Send + Sync {
    /// Inspect a single error of the chain. `sink` exposes whether a status was
    /// already written to the response.
    fn extract<'e>(
        &self,
        err: &'e (dyn Error + 'static),
        sink: &dyn ResponseSink,
    ) -> Option<Carried<'e>>;
}

/// An error tagged with an explicit HTTP status.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {source}")]
pub struct StatusError {
    status: StatusCode,
    source: Box<dyn Error + Send + Sync>,
}

impl StatusError {
    #[must_use]
    pub fn new(status: StatusCode, err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            status,
            source: err.into(),
        }
    }

    #[must_use]
    pub fn bad_request(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    #[must_use]
    pub fn unauthorized(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err)
    }

    #[must_use]
    pub fn forbidden(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::FORBIDDEN, err)
    }

    #[must_use]
    pub fn not_found(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    #[must_use]
    pub fn request_timeout(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, err)
    }

    #[must_use]
    pub fn conflict(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::CONFLICT, err)
    }

    #[must_use]
    pub fn internal(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Extractor for [`StatusError`], installed on every resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusErrorCarrier;

impl CarrierExtractor for StatusErrorCarrier {
    fn extract<'e>(
        &self,
        err: &'e (dyn Error + 'static),
        _sink: &dyn ResponseSink,
    ) -> Option<Carried<'e>> {
        let carrier = err.downcast_ref::<StatusError>()?;
        let cause: &(dyn Error + 'static) = carrier.cause();
        Some(Carried {
            status: carrier.status,
            cause: Some(cause),
        })
    }
}

/// Walk the `source()` chain from the outermost error inward and return the
/// first carrier any extractor recognizes.
pub fn find_carrier<'e>(
    extractors: &[Arc<dyn CarrierExtractor>],
    err: &'e (dyn Error + 'static),
    sink: &dyn ResponseSink,
) -> Option<Carried<'e>> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(carried) = extractors.iter().find_map(|x| x.extract(e, sink)) {
            return Some(carried);
        }
        current = e.source();
    }
    None
}

/// Render an error and its sources, one `caused by:` line per source.
#[must_use]
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
