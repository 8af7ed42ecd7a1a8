//! Problem details resolution for HTTP handlers
//!
//! This crate turns arbitrary application errors into RFC 7807 problem details
//! responses (`application/problem+json`). It includes:
//! - The problem model (`ProblemDetail`) and its capability trait (`ProblemDetailErr`)
//! - Rule tables keyed by error kind or by status code (`ProblemRegistry`)
//! - The resolver that classifies an error and writes one response (`ProblemResolver`)
//! - An axum adapter (`axum_ext`, behind the `axum-ext` feature)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod carrier;
pub mod catalog;
pub mod config;
pub mod error;
pub mod problem;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod status;

#[cfg(feature = "axum-ext")]
pub mod axum_ext;

// Re-export commonly used types
pub use carrier::{Carried, CarrierExtractor, StatusError, StatusErrorCarrier};
pub use catalog::ProblemDef;
pub use config::{ConfigError, OccurrenceField, ResolverConfig};
pub use error::ResolveError;
pub use problem::{APPLICATION_PROBLEM_JSON, ProblemDetail, ProblemDetailErr, Timestamp};
pub use registry::{IntoProblemFactory, KindMatch, ProblemFactory, ProblemRegistry};
pub use resolver::{MatchedRule, ProblemResolver, Resolved};
pub use sink::{RequestContext, ResponseRecorder, ResponseSink};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
