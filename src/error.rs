use crate::engine::EngineError;
use thiserror::Error;

/// Failure kinds of a resolution run.
///
/// `DegenerateGeometry` covers unusable source geometry (single-point route
/// lines and the like); inside the pipeline, zero-length candidate segments
/// are absorbed by the classifier (excluded, reported through the observer)
/// rather than raised. Every other kind aborts the run and leaves any
/// previously published rule table untouched.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("input not found: {0}")]
    InputNotFound(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("geometry engine failure: {0}")]
    GeometryEngine(#[from] EngineError),

    #[error("rule table '{0}' exists with an incompatible identity and cannot be replaced")]
    SchemaConflict(String),
}
