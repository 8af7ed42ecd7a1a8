//! Axum integration
//!
//! Handlers return [`HandlerError`]; [`problem_details_middleware`] resolves it
//! into a problem details response. Error responses produced elsewhere in the
//! stack (extractor rejections, fallbacks, plain `(StatusCode, String)` tuples)
//! are resolved too, with the already written status acting as the carrier.

use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{
    HeaderMap, StatusCode,
    header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue},
};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::carrier::{Carried, CarrierExtractor, StatusError};
use crate::config::{ConfigError, ResolverConfig};
use crate::problem::{APPLICATION_PROBLEM_JSON, ProblemDetail};
use crate::registry::ProblemRegistry;
use crate::resolver::ProblemResolver;
use crate::sink::{ResponseRecorder, ResponseSink};
use crate::status::reason_phrase;

/// Largest error body read back when turning a plain error response into a problem.
const MAX_REJECTION_BODY: usize = 64 * 1024;

/// Error type for axum handlers.
///
/// Converts from any error with `?`. The response it produces is a placeholder
/// carrying the error in its extensions; the middleware replaces it.
#[derive(Clone)]
pub struct HandlerError {
    inner: Arc<dyn Error + Send + Sync>,
}

impl HandlerError {
    #[must_use]
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        let boxed: Box<dyn Error + Send + Sync> = err.into();
        Self {
            inner: Arc::from(boxed),
        }
    }

    /// Attach an explicit status to `err`.
    #[must_use]
    pub fn with_status(status: StatusCode, err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(StatusError::new(status, err))
    }

    #[must_use]
    pub fn as_error(&self) -> &(dyn Error + 'static) {
        &*self.inner
    }

    fn status_hint(&self) -> StatusCode {
        self.inner
            .downcast_ref::<StatusError>()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, StatusError::status)
    }
}

impl<E> From<E> for HandlerError
where
    E: Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = self.status_hint().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// An error response that was already written by the time the middleware saw it.
#[derive(Debug, thiserror::Error)]
#[error("request rejected: {source}")]
pub struct Rejection {
    source: Box<dyn Error + Send + Sync>,
}

impl Rejection {
    #[must_use]
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self { source: err.into() }
    }
}

/// Carrier for [`Rejection`]: the status comes from the response, not the error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectionCarrier;

impl CarrierExtractor for RejectionCarrier {
    fn extract<'e>(
        &self,
        err: &'e (dyn Error + 'static),
        sink: &dyn ResponseSink,
    ) -> Option<Carried<'e>> {
        let rejection = err.downcast_ref::<Rejection>()?;
        let status = sink.written_status()?;
        let cause: &(dyn Error + 'static) = rejection.source.as_ref();
        Some(Carried {
            status,
            cause: Some(cause),
        })
    }
}

/// Response sink that converts into an axum response.
#[derive(Debug, Default)]
#[must_use]
pub struct ProblemResponse(ResponseRecorder);

impl ProblemResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink replacing a response already written with `status`.
    pub fn after(status: StatusCode) -> Self {
        Self(ResponseRecorder::after(status))
    }
}

impl ResponseSink for ProblemResponse {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.0.set_header(name, value);
    }

    fn set_status(&mut self, status: StatusCode) {
        self.0.set_status(status);
    }

    fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        self.0.write(body)
    }

    fn written_status(&self) -> Option<StatusCode> {
        self.0.written_status()
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        self.0.into_response().map(Body::from)
    }
}

/// Make `ProblemDetail` directly usable as a response, bypassing resolution.
impl IntoResponse for ProblemDetail {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_PROBLEM_JSON));
        resp
    }
}

/// Build the resolver used by [`problem_details_middleware`].
///
/// # Errors
/// Returns `ConfigError` if `config` fails validation.
pub fn axum_resolver(
    registry: Arc<ProblemRegistry>,
    config: ResolverConfig,
) -> Result<Arc<ProblemResolver>, ConfigError> {
    config.validate()?;
    Ok(Arc::new(
        ProblemResolver::new(registry)
            .with_config(config)
            .with_carrier(RejectionCarrier),
    ))
}

/// Resolve handler errors and plain error responses into problem details.
///
/// Install with `axum::middleware::from_fn_with_state(resolver, problem_details_middleware)`.
pub async fn problem_details_middleware(
    State(resolver): State<Arc<ProblemResolver>>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();
    let mut response = next.run(request).await;

    if let Some(err) = response.extensions_mut().remove::<HandlerError>() {
        let mut sink = ProblemResponse::new();
        return match resolver.resolve(&mut sink, &uri, err.as_error()) {
            Ok(_) => sink.into_response(),
            Err(e) => {
                tracing::error!(error = %e, uri = %uri, "failed to resolve handler error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_problem_response(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let rejection = Rejection::new(rejection_message(body, status).await);
    let mut sink = ProblemResponse::after(status);
    match resolver.resolve(&mut sink, &uri, &rejection) {
        Ok(_) => {
            let mut converted = sink.into_response();
            carry_headers(&parts.headers, converted.headers_mut());
            converted
        }
        Err(e) => {
            tracing::error!(error = %e, uri = %uri, "failed to resolve error response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn is_problem_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(APPLICATION_PROBLEM_JSON))
}

/// Copy headers of the replaced response except those describing its body.
fn carry_headers(original: &HeaderMap, converted: &mut HeaderMap) {
    for (name, value) in original {
        if name != CONTENT_TYPE && name != CONTENT_LENGTH {
            converted.append(name.clone(), value.clone());
        }
    }
}

async fn rejection_message(body: Body, status: StatusCode) -> String {
    let text = match axum::body::to_bytes(body, MAX_REJECTION_BODY).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "could not read error response body");
            String::new()
        }
    };
    if text.is_empty() {
        reason_phrase(status.as_u16()).to_owned()
    } else {
        text
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("database is down")]
    struct DbError;

    #[test]
    fn handler_error_response_carries_the_error() {
        let response = HandlerError::from(DbError).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = response.extensions().get::<HandlerError>().unwrap();
        assert_eq!(err.to_string(), "database is down");
        assert!(err.as_error().is::<DbError>());
    }

    #[test]
    fn handler_error_with_status_uses_carrier_status() {
        let err = HandlerError::with_status(StatusCode::NOT_FOUND, "order 7");

        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejection_carrier_needs_written_status() {
        let rejection = Rejection::new("Missing request header");

        assert!(RejectionCarrier.extract(&rejection, &ProblemResponse::new()).is_none());

        let sink = ProblemResponse::after(StatusCode::BAD_REQUEST);
        let carried = RejectionCarrier.extract(&rejection, &sink).unwrap();
        assert_eq!(carried.status, StatusCode::BAD_REQUEST);
        assert_eq!(carried.cause.unwrap().to_string(), "Missing request header");
    }

    #[test]
    fn problem_detail_into_response_sets_content_type() {
        let response =
            ProblemDetail::new(StatusCode::CONFLICT, "Conflict", "duplicate").into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[CONTENT_TYPE], APPLICATION_PROBLEM_JSON);
    }

    #[test]
    fn carry_headers_skips_body_headers() {
        let mut original = HeaderMap::new();
        original.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        original.insert(CONTENT_LENGTH, HeaderValue::from_static("13"));
        original.insert("retry-after", HeaderValue::from_static("30"));
        original.append("vary", HeaderValue::from_static("accept"));
        original.append("vary", HeaderValue::from_static("origin"));
        let mut converted = HeaderMap::new();
        converted.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_PROBLEM_JSON));

        carry_headers(&original, &mut converted);

        assert_eq!(converted[CONTENT_TYPE], APPLICATION_PROBLEM_JSON);
        assert!(converted.get(CONTENT_LENGTH).is_none());
        assert_eq!(converted["retry-after"], "30");
        assert_eq!(converted.get_all("vary").iter().count(), 2);
    }

    #[test]
    fn axum_resolver_validates_config() {
        let registry = Arc::new(ProblemRegistry::new());
        let bad = ResolverConfig {
            type_base_uri: String::new(),
            ..ResolverConfig::default()
        };

        assert!(axum_resolver(Arc::clone(&registry), bad).is_err());
        assert!(axum_resolver(registry, ResolverConfig::default()).is_ok());
    }
}
