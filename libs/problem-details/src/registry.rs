//! Rule tables consulted by the resolver
//!
//! Two tables map an error kind (the concrete Rust type of an error) or an HTTP
//! status code to a factory producing a problem payload. Registration overwrites
//! any previous rule for the same key; there is no removal.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::ProblemDef;
use crate::problem::ProblemDetailErr;

/// Shared factory producing a fresh problem payload for every resolution.
pub type ProblemFactory = Arc<dyn Fn() -> Box<dyn ProblemDetailErr> + Send + Sync>;

/// Anything that can be registered as a rule's factory.
pub trait IntoProblemFactory {
    fn into_factory(self) -> ProblemFactory;
}

impl<F, P> IntoProblemFactory for F
where
    F: Fn() -> P + Send + Sync + 'static,
    P: ProblemDetailErr,
{
    fn into_factory(self) -> ProblemFactory {
        Arc::new(move || Box::new(self()) as Box<dyn ProblemDetailErr>)
    }
}

impl IntoProblemFactory for ProblemDef {
    fn into_factory(self) -> ProblemFactory {
        self.factory().into_factory()
    }
}

type KindProbe = fn(&(dyn Error + 'static)) -> bool;

fn is_kind<K: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<K>()
}

#[derive(Clone)]
struct KindRule {
    kind: &'static str,
    probe: KindProbe,
    factory: ProblemFactory,
}

/// A rule selected for an error's concrete kind.
#[derive(Clone)]
pub struct KindMatch {
    /// Type name of the matched error kind, for diagnostics.
    pub kind: &'static str,
    pub factory: ProblemFactory,
}

impl fmt::Debug for KindMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindMatch")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Process-wide mapping rules, shared by every resolution.
///
/// Safe to mutate while requests are being resolved; factories are cloned out
/// before they run, so no lock is held while application code executes.
#[derive(Default)]
pub struct ProblemRegistry {
    by_kind: RwLock<HashMap<TypeId, KindRule>>,
    by_status: RwLock<HashMap<u16, ProblemFactory>>,
}

impl fmt::Debug for ProblemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> = self.by_kind.read().values().map(|r| r.kind).collect();
        kinds.sort_unstable();
        let mut statuses: Vec<u16> = self.by_status.read().keys().copied().collect();
        statuses.sort_unstable();
        f.debug_struct("ProblemRegistry")
            .field("kinds", &kinds)
            .field("statuses", &statuses)
            .finish()
    }
}

impl ProblemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the error kind `K` to a problem factory, replacing any previous rule.
    ///
    /// Matching is by exact concrete type of the (unwrapped) error.
    pub fn register_by_error_kind<K: Error + 'static>(&self, factory: impl IntoProblemFactory) {
        let kind = type_name::<K>();
        tracing::trace!(kind, "registering error-kind rule");
        self.by_kind.write().insert(
            TypeId::of::<K>(),
            KindRule {
                kind,
                probe: is_kind::<K>,
                factory: factory.into_factory(),
            },
        );
    }

    /// Map a status code to a problem factory, replacing any previous rule.
    pub fn register_by_status(&self, status: u16, factory: impl IntoProblemFactory) {
        tracing::trace!(status, "registering status rule");
        self.by_status
            .write()
            .insert(status, factory.into_factory());
    }

    #[must_use]
    pub fn lookup_by_error_kind<K: Error + 'static>(&self) -> Option<ProblemFactory> {
        self.by_kind
            .read()
            .get(&TypeId::of::<K>())
            .map(|rule| Arc::clone(&rule.factory))
    }

    #[must_use]
    pub fn lookup_by_status(&self, status: u16) -> Option<ProblemFactory> {
        self.by_status.read().get(&status).map(Arc::clone)
    }

    /// Find the rule registered for the concrete kind of `err`.
    #[must_use]
    pub fn match_error(&self, err: &(dyn Error + 'static)) -> Option<KindMatch> {
        self.by_kind
            .read()
            .values()
            .find(|rule| (rule.probe)(err))
            .map(|rule| KindMatch {
                kind: rule.kind,
                factory: Arc::clone(&rule.factory),
            })
    }
}
