use crate::error::ParseError;
use crate::geometry::GeometryKind;
use crate::temporal::TemporalKind;
use crate::value::ParsedValue;

/// The dispatch branch a token was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Quoted,
    Geometry(GeometryKind),
    /// The generic `Geometry(..)` form
    Shape,
    List,
    Temporal(TemporalKind),
    Reference,
    Number,
}

/// Hook called around every dispatch branch.
pub trait ParseObserver {
    fn enter(&self, _branch: Branch, _token: &str, _depth: usize) {}

    fn exit(&self, _branch: Branch, _depth: usize, _outcome: Result<&ParsedValue, &ParseError>) {}
}

/// Observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ParseObserver for NoopObserver {}

/// Reports branch entry at `debug` and exit at `trace` through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ParseObserver for TracingObserver {
    fn enter(&self, branch: Branch, token: &str, depth: usize) {
        tracing::debug!(?branch, depth, token, "parsing");
    }

    fn exit(&self, branch: Branch, depth: usize, outcome: Result<&ParsedValue, &ParseError>) {
        match outcome {
            Ok(value) => tracing::trace!(?branch, depth, kind = value.kind_name(), "parsed"),
            Err(err) => tracing::trace!(?branch, depth, error = %err, "failed"),
        }
    }
}
