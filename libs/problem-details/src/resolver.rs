//! Error classification and problem details emission
//!
//! [`ProblemResolver::resolve`] runs a fixed decision chain for one error:
//! 1. Status extraction: the first carrier found in the error chain supplies the
//!    status and the inner application error; otherwise the status is 500.
//! 2. Error-kind rule: the rule registered for the concrete type of the error.
//!    If the resulting problem's status also has a status rule, the status rule's
//!    payload is written while the error-kind payload is returned.
//! 3. Status rule: the rule registered for the extracted status.
//! 4. Default: a problem synthesized from the status and the error.
//!
//! Payloads produced by rules are completed before they are written: `detail`
//! always becomes the error message, and empty members get their defaults.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use http::{
    StatusCode,
    header::{CONTENT_TYPE, HeaderValue},
};

use crate::carrier::{Carried, CarrierExtractor, StatusErrorCarrier, error_chain, find_carrier};
use crate::config::{OccurrenceField, ResolverConfig};
use crate::error::ResolveError;
use crate::problem::{APPLICATION_PROBLEM_JSON, ProblemDetail, ProblemDetailErr};
use crate::registry::ProblemRegistry;
use crate::sink::{RequestContext, ResponseSink};
use crate::status::{reason_phrase, type_uri};

/// Which step of the decision chain produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedRule {
    /// An error-kind rule; its payload was written.
    ErrorKind,
    /// An error-kind rule whose status also had a status rule; the status rule's
    /// payload was written.
    ErrorKindStatusOverride,
    /// A status rule.
    Status,
    /// No rule matched.
    Default,
}

impl MatchedRule {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ErrorKind => "error_kind",
            Self::ErrorKindStatusOverride => "error_kind_status_override",
            Self::Status => "status",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful resolution.
#[derive(Debug)]
pub struct Resolved {
    /// The problem computed for the error. With
    /// [`MatchedRule::ErrorKindStatusOverride`] this is the error-kind payload,
    /// not the one that was written.
    pub problem: Box<dyn ProblemDetailErr>,
    pub rule: MatchedRule,
    /// Status written to the sink.
    pub status: StatusCode,
    pub bytes_written: usize,
}

/// Maps errors to problem details responses.
///
/// Stateless per call; rules live in the shared [`ProblemRegistry`]. Cheap to
/// clone and safe to share across concurrent requests.
#[derive(Clone)]
#[must_use]
pub struct ProblemResolver {
    registry: Arc<ProblemRegistry>,
    config: ResolverConfig,
    carriers: Vec<Arc<dyn CarrierExtractor>>,
}

impl fmt::Debug for ProblemResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemResolver")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("carriers", &self.carriers.len())
            .finish()
    }
}

impl ProblemResolver {
    /// A resolver with default configuration and the built-in `StatusError` carrier.
    pub fn new(registry: Arc<ProblemRegistry>) -> Self {
        Self {
            registry,
            config: ResolverConfig::default(),
            carriers: vec![Arc::new(StatusErrorCarrier)],
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Recognize an additional carrier shape. Extractors are tried in the order
    /// they were added, after the built-in one.
    pub fn with_carrier(mut self, carrier: impl CarrierExtractor + 'static) -> Self {
        self.carriers.push(Arc::new(carrier));
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProblemRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Classify `err`, select a payload and write it to `sink`.
    ///
    /// Exactly one payload is written on success. Encoding happens before the
    /// sink is touched, so a payload that cannot be encoded leaves it untouched.
    ///
    /// # Errors
    /// Returns `ResolveError` if the selected payload cannot be encoded, carries
    /// an invalid status, or the sink fails to accept the body.
    pub fn resolve<R>(
        &self,
        sink: &mut dyn ResponseSink,
        request: &R,
        err: &(dyn Error + 'static),
    ) -> Result<Resolved, ResolveError>
    where
        R: RequestContext + ?Sized,
    {
        let (status, cause) = self.classify(err, &*sink);
        let completion = Completion {
            config: &self.config,
            request_uri: request.request_uri(),
            status,
            cause,
            original: err,
        };

        if let Some(matched) = self.registry.match_error(cause) {
            let mut problem = (matched.factory)();
            completion.apply(&mut *problem);

            if let Some(factory) = self.registry.lookup_by_status(problem.status()) {
                // the override defaults to the status it was matched on
                let matched_status =
                    StatusCode::from_u16(problem.status()).unwrap_or(completion.status);
                let mut written = factory();
                Completion {
                    status: matched_status,
                    ..completion
                }
                .apply(&mut *written);
                let (status, bytes_written) = write_problem(sink, &*written)?;
                tracing::debug!(
                    kind = matched.kind,
                    status = status.as_u16(),
                    "error-kind rule matched, status rule overrides written body"
                );
                return Ok(Resolved {
                    problem,
                    rule: MatchedRule::ErrorKindStatusOverride,
                    status,
                    bytes_written,
                });
            }

            let (status, bytes_written) = write_problem(sink, &*problem)?;
            tracing::debug!(
                kind = matched.kind,
                status = status.as_u16(),
                "error-kind rule matched"
            );
            return Ok(Resolved {
                problem,
                rule: MatchedRule::ErrorKind,
                status,
                bytes_written,
            });
        }

        if let Some(factory) = self.registry.lookup_by_status(status.as_u16()) {
            let mut problem = factory();
            completion.apply(&mut *problem);
            let (written_status, bytes_written) = write_problem(sink, &*problem)?;
            tracing::debug!(
                status = status.as_u16(),
                written_status = written_status.as_u16(),
                "status rule matched"
            );
            return Ok(Resolved {
                problem,
                rule: MatchedRule::Status,
                status: written_status,
                bytes_written,
            });
        }

        let mut problem = ProblemDetail::default();
        completion.apply(&mut problem);
        let (status, bytes_written) = write_problem(sink, &problem)?;
        tracing::debug!(status = status.as_u16(), "no rule matched, default problem");
        Ok(Resolved {
            problem: Box::new(problem),
            rule: MatchedRule::Default,
            status,
            bytes_written,
        })
    }

    /// Step 1: effective status and the error rules are matched against.
    fn classify<'e>(
        &self,
        err: &'e (dyn Error + 'static),
        sink: &dyn ResponseSink,
    ) -> (StatusCode, &'e (dyn Error + 'static)) {
        match find_carrier(&self.carriers, err, sink) {
            Some(Carried {
                status,
                cause: Some(cause),
            }) => {
                tracing::debug!(status = status.as_u16(), "status carrier found");
                (status, cause)
            }
            Some(Carried { status, cause: None }) => {
                tracing::debug!(
                    status = status.as_u16(),
                    "ignoring status carrier without an inner cause"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, err)
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, err),
        }
    }
}

/// Defaulting rules shared by every payload the resolver writes.
struct Completion<'a> {
    config: &'a ResolverConfig,
    request_uri: &'a str,
    status: StatusCode,
    cause: &'a (dyn Error + 'static),
    original: &'a (dyn Error + 'static),
}

impl Completion<'_> {
    fn apply(&self, problem: &mut dyn ProblemDetailErr) {
        // detail is always replaced, even when the factory set one
        problem.set_detail(self.cause.to_string());

        if problem.status() == 0 {
            problem.set_status(self.status.as_u16());
        }
        match self.config.occurrence {
            OccurrenceField::Instance => {
                if problem.instance().is_empty() {
                    problem.set_instance(self.request_uri.to_owned());
                }
            }
            OccurrenceField::Timestamp => {
                if problem.timestamp().is_none() {
                    problem.set_timestamp(Some(Utc::now()));
                }
            }
        }
        if problem.type_url().is_empty() {
            problem.set_type_url(type_uri(&self.config.type_base_uri, problem.status()));
        }
        if problem.title().is_empty() {
            problem.set_title(reason_phrase(problem.status()).to_owned());
        }
        if self.config.capture_stack_trace && problem.stack_trace().is_empty() {
            problem.set_stack_trace(error_chain(self.original));
        }
    }
}

/// Encode first, then set the content type, the status line and the body.
fn write_problem(
    sink: &mut dyn ResponseSink,
    problem: &dyn ProblemDetailErr,
) -> Result<(StatusCode, usize), ResolveError> {
    let status = StatusCode::from_u16(problem.status())
        .map_err(|_| ResolveError::InvalidStatus(problem.status()))?;
    let body = problem.to_json()?;

    sink.set_header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_PROBLEM_JSON));
    sink.set_status(status);
    let written = sink.write(&body).map_err(ResolveError::Write)?;
    Ok((status, written))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::carrier::StatusError;
    use crate::sink::ResponseRecorder;
    use tracing_test::traced_test;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct BadRequestError(String);

    fn resolver() -> (Arc<ProblemRegistry>, ProblemResolver) {
        let registry = Arc::new(ProblemRegistry::new());
        let resolver = ProblemResolver::new(Arc::clone(&registry));
        (registry, resolver)
    }

    #[test]
    fn default_problem_is_fully_populated() {
        let (_, resolver) = resolver();
        let mut sink = ResponseRecorder::new();

        let resolved = resolver
            .resolve(&mut sink, "/orders", &std::io::Error::other("boom"))
            .unwrap();

        assert_eq!(resolved.rule, MatchedRule::Default);
        assert_eq!(resolved.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resolved.problem.status(), 500);
        assert_eq!(resolved.problem.title(), "Internal Server Error");
        assert_eq!(resolved.problem.detail(), "boom");
        assert_eq!(resolved.problem.type_url(), "https://httpstatuses.io/500");
        assert_eq!(resolved.problem.instance(), "/orders");
        assert!(resolved.problem.stack_trace().is_empty());
        assert_eq!(resolved.bytes_written, sink.body().len());
    }

    #[test]
    fn completion_respects_values_set_by_factory() {
        let (registry, resolver) = resolver();
        registry.register_by_error_kind::<BadRequestError>(|| {
            ProblemDetail::default()
                .with_status(400)
                .with_title("custom")
                .with_type("https://errors.example.com/bad")
                .with_instance("/fixed")
                .with_detail("ignored")
        });
        let mut sink = ResponseRecorder::new();

        let resolved = resolver
            .resolve(&mut sink, "/orders", &BadRequestError("X".to_owned()))
            .unwrap();

        assert_eq!(resolved.problem.title(), "custom");
        assert_eq!(resolved.problem.type_url(), "https://errors.example.com/bad");
        assert_eq!(resolved.problem.instance(), "/fixed");
        assert_eq!(resolved.problem.detail(), "X");
    }

    #[test]
    fn zero_status_from_factory_defaults_to_extracted_status() {
        let (registry, resolver) = resolver();
        registry.register_by_error_kind::<BadRequestError>(ProblemDetail::default);
        let mut sink = ResponseRecorder::new();

        let resolved = resolver
            .resolve(&mut sink, "/", &BadRequestError("X".to_owned()))
            .unwrap();

        assert_eq!(resolved.problem.status(), 500);
        assert_eq!(resolved.problem.title(), "Internal Server Error");
        assert_eq!(sink.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn configured_type_base_is_used() {
        let (_, resolver) = resolver();
        let resolver = resolver.with_config(ResolverConfig {
            type_base_uri: "https://errors.example.com/".to_owned(),
            ..ResolverConfig::default()
        });
        let mut sink = ResponseRecorder::new();

        let resolved = resolver
            .resolve(&mut sink, "/", &StatusError::not_found("gone"))
            .unwrap();

        assert_eq!(resolved.problem.type_url(), "https://errors.example.com/404");
    }

    #[test]
    fn stack_trace_uses_original_error_chain() {
        let (_, resolver) = resolver();
        let resolver = resolver.with_config(ResolverConfig {
            capture_stack_trace: true,
            ..ResolverConfig::default()
        });
        let mut sink = ResponseRecorder::new();
        let err = StatusError::not_found(std::io::Error::other("audit: row 7 deleted"));

        let resolved = resolver.resolve(&mut sink, "/", &err).unwrap();

        assert_eq!(resolved.problem.detail(), "audit: row 7 deleted");
        assert_eq!(
            resolved.problem.stack_trace(),
            "404 Not Found: audit: row 7 deleted\ncaused by: audit: row 7 deleted"
        );
    }

    #[traced_test]
    #[test]
    fn logs_classification_decisions() {
        let (registry, resolver) = resolver();
        registry.register_by_error_kind::<BadRequestError>(|| {
            ProblemDetail::default().with_status(400)
        });
        let mut sink = ResponseRecorder::new();

        resolver
            .resolve(&mut sink, "/", &BadRequestError("X".to_owned()))
            .unwrap();

        assert!(logs_contain("error-kind rule matched"));
    }

    #[traced_test]
    #[test]
    fn logs_carrier_extraction() {
        let (_, resolver) = resolver();
        let mut sink = ResponseRecorder::new();

        resolver
            .resolve(&mut sink, "/", &StatusError::conflict("stale"))
            .unwrap();

        assert!(logs_contain("status carrier found"));
        assert!(logs_contain("no rule matched"));
    }

    #[test]
    fn matched_rule_names_are_stable() {
        assert_eq!(MatchedRule::ErrorKind.to_string(), "error_kind");
        assert_eq!(
            MatchedRule::ErrorKindStatusOverride.as_str(),
            "error_kind_status_override"
        );
        assert_eq!(MatchedRule::Status.as_str(), "status");
        assert_eq!(MatchedRule::Default.as_str(), "default");
    }
}
