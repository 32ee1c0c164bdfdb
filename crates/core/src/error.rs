//! Pipeline error taxonomy.

use thiserror::Error;

/// Errors raised by the enrichment pipeline.
///
/// Transient external failures are retried inside the call wrapper and only
/// surface here once the retry budget is spent. Missing data is never
/// silently defaulted unless a defined fallback exists (the zero-address
/// builder sentinel).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The retry budget for an external call is exhausted.
    #[error("{label} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        label: &'static str,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// Data required for enrichment is absent (no matching log, empty
    /// configuration payload, missing reported profit).
    #[error("missing data: {0}")]
    MissingData(String),

    /// Every configured protocol is inactive.
    #[error("no active protocol in configuration")]
    NoActiveProtocol,
}
