//! RFC 7807 problem details model and its capability trait

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::status::{DEFAULT_TYPE_BASE_URI, type_uri};

/// Content type for problem details responses.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Point in time recorded on a problem occurrence.
pub type Timestamp = DateTime<Utc>;

#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn is_unset_status(status: &u16) -> bool {
    *status == 0
}

/// RFC 7807 problem details.
///
/// Every member is optional on the wire: a zero status, empty strings and a
/// missing timestamp are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct ProblemDetail {
    /// The HTTP status code for this occurrence of the problem. `0` means unset.
    #[serde(default, skip_serializing_if = "is_unset_status")]
    pub status: u16,
    /// A short, human-readable summary of the problem type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// A human-readable explanation specific to this occurrence of the problem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_url: String,
    /// The request URI that produced this occurrence.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,
    /// When this occurrence happened, used instead of `instance` in timestamp mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Formatted error chain, present only when captured.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stack_trace: String,
}

impl ProblemDetail {
    /// Create a new problem with the given status, title, and detail.
    ///
    /// The type URI is derived from the status code under the default base URI.
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            title: title.into(),
            detail: detail.into(),
            type_url: type_uri(DEFAULT_TYPE_BASE_URI, status.as_u16()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_timestamp(mut self, at: Timestamp) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = trace.into();
        self
    }
}

/// Read/write capability surface of a problem details payload.
///
/// The registry stores factories producing this trait object, so custom
/// payload shapes (extra members) flow through the resolver untouched. A custom
/// shape usually embeds a [`ProblemDetail`] and derives the implementation
/// with [`impl_problem_detail_err!`](crate::impl_problem_detail_err).
///
/// Setters return the trait object so calls compose:
///
/// ```
/// use problem_details::{ProblemDetail, ProblemDetailErr};
///
/// let mut problem = ProblemDetail::default();
/// problem.set_status(404).set_title("Not Found".to_owned());
/// assert_eq!(problem.title(), "Not Found");
/// ```
pub trait ProblemDetailErr: fmt::Debug + Send + Sync + 'static {
    fn status(&self) -> u16;
    fn set_status(&mut self, status: u16) -> &mut dyn ProblemDetailErr;

    fn title(&self) -> &str;
    fn set_title(&mut self, title: String) -> &mut dyn ProblemDetailErr;

    fn detail(&self) -> &str;
    fn set_detail(&mut self, detail: String) -> &mut dyn ProblemDetailErr;

    fn type_url(&self) -> &str;
    fn set_type_url(&mut self, type_url: String) -> &mut dyn ProblemDetailErr;

    fn instance(&self) -> &str;
    fn set_instance(&mut self, instance: String) -> &mut dyn ProblemDetailErr;

    fn timestamp(&self) -> Option<Timestamp>;
    fn set_timestamp(&mut self, at: Option<Timestamp>) -> &mut dyn ProblemDetailErr;

    fn stack_trace(&self) -> &str;
    fn set_stack_trace(&mut self, trace: String) -> &mut dyn ProblemDetailErr;

    /// Serialize the whole payload, including any members of a custom shape.
    ///
    /// # Errors
    /// Returns the serializer error if the payload cannot be encoded.
    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn ProblemDetailErr {
    /// Returns `true` if the payload is of type `T`.
    #[must_use]
    pub fn is<T: ProblemDetailErr>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: ProblemDetailErr>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: ProblemDetailErr>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl ProblemDetailErr for ProblemDetail {
    fn status(&self) -> u16 {
        self.status
    }

    fn set_status(&mut self, status: u16) -> &mut dyn ProblemDetailErr {
        self.status = status;
        self
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: String) -> &mut dyn ProblemDetailErr {
        self.title = title;
        self
    }

    fn detail(&self) -> &str {
        &self.detail
    }

    fn set_detail(&mut self, detail: String) -> &mut dyn ProblemDetailErr {
        self.detail = detail;
        self
    }

    fn type_url(&self) -> &str {
        &self.type_url
    }

    fn set_type_url(&mut self, type_url: String) -> &mut dyn ProblemDetailErr {
        self.type_url = type_url;
        self
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    fn set_instance(&mut self, instance: String) -> &mut dyn ProblemDetailErr {
        self.instance = instance;
        self
    }

    fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    fn set_timestamp(&mut self, at: Option<Timestamp>) -> &mut dyn ProblemDetailErr {
        self.timestamp = at;
        self
    }

    fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    fn set_stack_trace(&mut self, trace: String) -> &mut dyn ProblemDetailErr {
        self.stack_trace = trace;
        self
    }

    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Implements [`ProblemDetailErr`] for a custom payload that embeds a
/// [`ProblemDetail`] in one of its fields.
///
/// The type must implement `Serialize`, `Debug`, `Send` and `Sync`. Flatten the
/// embedded field so the standard members stay at the top level:
///
/// ```
/// use problem_details::{ProblemDetail, impl_problem_detail_err};
/// use serde::Serialize;
///
/// #[derive(Debug, Serialize)]
/// struct OutOfStock {
///     #[serde(flatten)]
///     base: ProblemDetail,
///     sku: String,
/// }
///
/// impl_problem_detail_err!(OutOfStock, base);
/// ```
#[macro_export]
macro_rules! impl_problem_detail_err {
    ($ty:ty, $field:ident) => {
        impl $crate::ProblemDetailErr for $ty {
            fn status(&self) -> u16 {
                self.$field.status
            }

            fn set_status(&mut self, status: u16) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.status = status;
                self
            }

            fn title(&self) -> &str {
                &self.$field.title
            }

            fn set_title(&mut self, title: ::std::string::String) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.title = title;
                self
            }

            fn detail(&self) -> &str {
                &self.$field.detail
            }

            fn set_detail(&mut self, detail: ::std::string::String) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.detail = detail;
                self
            }

            fn type_url(&self) -> &str {
                &self.$field.type_url
            }

            fn set_type_url(&mut self, type_url: ::std::string::String) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.type_url = type_url;
                self
            }

            fn instance(&self) -> &str {
                &self.$field.instance
            }

            fn set_instance(&mut self, instance: ::std::string::String) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.instance = instance;
                self
            }

            fn timestamp(&self) -> ::std::option::Option<$crate::Timestamp> {
                self.$field.timestamp
            }

            fn set_timestamp(
                &mut self,
                at: ::std::option::Option<$crate::Timestamp>,
            ) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.timestamp = at;
                self
            }

            fn stack_trace(&self) -> &str {
                &self.$field.stack_trace
            }

            fn set_stack_trace(&mut self, trace: ::std::string::String) -> &mut dyn $crate::ProblemDetailErr {
                self.$field.stack_trace = trace;
                self
            }

            fn to_json(
                &self,
            ) -> ::std::result::Result<::std::vec::Vec<u8>, $crate::__private::serde_json::Error> {
                $crate::__private::serde_json::to_vec(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}
