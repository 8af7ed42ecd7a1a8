//! Response and request seams consumed by the resolver
//!
//! Framework adapters implement [`ResponseSink`] over their response object and
//! [`RequestContext`] over their request type. [`ResponseRecorder`] is an
//! in-memory sink that converts into an `http::Response`.

use std::io;

use http::{
    Request, Response, StatusCode, Uri,
    header::{HeaderMap, HeaderName, HeaderValue},
    request::Parts,
    uri::PathAndQuery,
};

/// Write side of an HTTP response.
pub trait ResponseSink {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    fn set_status(&mut self, status: StatusCode);

    /// Append `body` to the response.
    ///
    /// # Errors
    /// Returns the underlying I/O error, e.g. when the connection is gone.
    fn write(&mut self, body: &[u8]) -> io::Result<usize>;

    /// Status already written to this response before resolution, if any.
    fn written_status(&self) -> Option<StatusCode> {
        None
    }
}

/// Read side of the request that produced the error.
pub trait RequestContext {
    /// Request target as path plus query, used for the `instance` member.
    fn request_uri(&self) -> &str;
}

impl RequestContext for str {
    fn request_uri(&self) -> &str {
        self
    }
}

impl RequestContext for String {
    fn request_uri(&self) -> &str {
        self
    }
}

impl RequestContext for Uri {
    fn request_uri(&self) -> &str {
        self.path_and_query()
            .map_or_else(|| self.path(), PathAndQuery::as_str)
    }
}

impl RequestContext for Parts {
    fn request_uri(&self) -> &str {
        self.uri.request_uri()
    }
}

impl<B> RequestContext for Request<B> {
    fn request_uri(&self) -> &str {
        self.uri().request_uri()
    }
}

/// In-memory response sink.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    prior_status: Option<StatusCode>,
}

impl ResponseRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder standing in for a response that was already written with `status`.
    #[must_use]
    pub fn after(status: StatusCode) -> Self {
        Self {
            prior_status: Some(status),
            ..Self::default()
        }
    }

    /// Status set on this recorder, `200 OK` if none was set.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// `true` once a status or body has been recorded.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.status.is_some() || !self.body.is_empty()
    }

    #[must_use]
    pub fn into_response(self) -> Response<Vec<u8>> {
        let status = self.status();
        let mut response = Response::new(self.body);
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for ResponseRecorder {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(body);
        Ok(body.len())
    }

    fn written_status(&self) -> Option<StatusCode> {
        self.prior_status
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn request_uri_keeps_path_and_query() {
        let uri: Uri = "http://localhost:8080/orders/7?expand=items".parse().unwrap();
        assert_eq!(uri.request_uri(), "/orders/7?expand=items");

        let bare: Uri = "http://localhost".parse().unwrap();
        assert_eq!(bare.request_uri(), "/");
    }

    #[test]
    fn request_types_expose_their_uri() {
        let request = Request::builder()
            .uri("/users/1?fields=name")
            .body(())
            .unwrap();
        assert_eq!(request.request_uri(), "/users/1?fields=name");

        let (parts, ()) = request.into_parts();
        assert_eq!(parts.request_uri(), "/users/1?fields=name");

        assert_eq!("/plain".request_uri(), "/plain");
    }

    #[test]
    fn recorder_collects_status_headers_and_body() {
        let mut recorder = ResponseRecorder::new();
        assert!(!recorder.is_written());

        recorder.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        recorder.set_status(StatusCode::ACCEPTED);
        assert_eq!(recorder.write(b"hello").unwrap(), 5);
        assert_eq!(recorder.write(b" world").unwrap(), 6);

        assert!(recorder.is_written());
        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(response.body(), b"hello world");
    }

    #[test]
    fn recorder_reports_prior_status() {
        assert_eq!(ResponseRecorder::new().written_status(), None);

        let recorder = ResponseRecorder::after(StatusCode::BAD_GATEWAY);
        assert_eq!(recorder.written_status(), Some(StatusCode::BAD_GATEWAY));
        assert!(!recorder.is_written());
    }
}
