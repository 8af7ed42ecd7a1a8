//! Static problem definitions (`ProblemDef`) usable as registry factories

use crate::problem::ProblemDetail;

/// Static problem definition from an application catalog.
///
/// Members left empty here are filled by the resolver, so a definition with no
/// `type_url` gets the canonical type URI of its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemDef {
    pub status: u16,
    pub title: &'static str,
    pub type_url: Option<&'static str>,
}

impl ProblemDef {
    /// Convert this definition into a fresh `ProblemDetail`.
    #[inline]
    pub fn as_problem(&self) -> ProblemDetail {
        ProblemDetail {
            status: self.status,
            title: self.title.to_owned(),
            type_url: self.type_url.map(str::to_owned).unwrap_or_default(),
            ..ProblemDetail::default()
        }
    }

    /// A factory closure producing this definition, for rule registration.
    #[must_use]
    pub fn factory(self) -> impl Fn() -> ProblemDetail + Send + Sync + 'static {
        move || self.as_problem()
    }
}
