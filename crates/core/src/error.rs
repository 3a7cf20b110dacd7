//! Error types for Docstream.
//!
//! Every failure a subscriber can observe is a `ListenError`, delivered
//! through the same result channel as successes.

use core::fmt;
use thiserror::Error;

/// Boxed error used for caller-supplied failures (transformations, decoders).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type delivered to subscription callbacks.
pub type ListenResult<T> = core::result::Result<T, ListenError>;

/// A document could not be interpreted as the requested type.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DecodeError {
    /// Creates a decode error with a message and no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a decode error wrapping an underlying cause.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::with_source(err.to_string(), err)
    }
}

/// The live source itself reported a failure (network, server).
///
/// Not retried here; retry is the source's concern.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Creates a transport error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One document that failed to decode.
#[derive(Debug)]
pub struct DecodeFailure {
    /// Id of the offending document.
    pub document_id: String,
    /// Why it failed.
    pub error: DecodeError,
}

impl DecodeFailure {
    /// Creates a decode failure for the given document.
    pub fn new(document_id: impl Into<String>, error: DecodeError) -> Self {
        Self {
            document_id: document_id.into(),
            error,
        }
    }
}

/// Decode failures of one emission that exceeded the threshold.
#[derive(Debug, Error)]
#[error(
    "{:.1}% of {total} documents failed to decode ({} failures)",
    .ratio * 100.0,
    .failures.len()
)]
pub struct DecodeFailureReport {
    ratio: f64,
    total: usize,
    failures: Vec<DecodeFailure>,
}

impl DecodeFailureReport {
    /// Creates a report. `ratio` is `failures.len() / total`.
    pub fn new(ratio: f64, total: usize, failures: Vec<DecodeFailure>) -> Self {
        Self {
            ratio,
            total,
            failures,
        }
    }

    /// Returns the failure ratio in `[0, 1]`.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Returns the number of documents in the snapshot.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the individual failures, in source order.
    #[inline]
    pub fn failures(&self) -> &[DecodeFailure] {
        &self.failures
    }

    /// Returns the number of failed documents.
    #[inline]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Ordinal name of a source position (0 -> "first").
pub fn ordinal(position: usize) -> &'static str {
    match position {
        0 => "first",
        1 => "second",
        2 => "third",
        3 => "fourth",
        _ => "later",
    }
}

/// A failure tagged with the position of the source that caused it.
#[derive(Debug)]
pub struct SlotFailure {
    /// 0-based position of the source in the combined subscription.
    pub position: usize,
    /// The source's failure.
    pub error: ListenError,
}

impl SlotFailure {
    /// Creates a tagged failure.
    pub fn new(position: usize, error: ListenError) -> Self {
        Self { position, error }
    }
}

/// A combined emission failed because one or more of its sources failed.
#[derive(Debug)]
pub struct CombinedSourceFailure {
    failures: Vec<SlotFailure>,
}

impl CombinedSourceFailure {
    /// Creates a combined failure. Failures are kept in position order.
    pub fn new(mut failures: Vec<SlotFailure>) -> Self {
        failures.sort_by_key(|f| f.position);
        Self { failures }
    }

    /// Returns every failing source.
    #[inline]
    pub fn failures(&self) -> &[SlotFailure] {
        &self.failures
    }

    /// Returns the failure of the lowest failing position.
    #[inline]
    pub fn first(&self) -> Option<&SlotFailure> {
        self.failures.first()
    }

    /// Returns the positions of the failing sources.
    pub fn positions(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.position).collect()
    }

    /// Returns the failure of the given source position, if it failed.
    pub fn at(&self, position: usize) -> Option<&ListenError> {
        self.failures
            .iter()
            .find(|f| f.position == position)
            .map(|f| &f.error)
    }
}

impl fmt::Display for CombinedSourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "combined subscription failed")?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{} source: {}", sep, ordinal(failure.position), failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CombinedSourceFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.first().map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

/// Failures delivered to subscribers.
#[derive(Debug, Error)]
pub enum ListenError {
    /// The live source reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The source delivered a null snapshot container.
    #[error("source delivered no snapshot")]
    MissingSnapshot,
    /// Too many documents failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeFailureReport),
    /// One or more sources of a combined subscription failed.
    #[error(transparent)]
    Combined(#[from] CombinedSourceFailure),
    /// The caller's transformation failed.
    #[error("transformation failed: {0}")]
    Transform(#[source] BoxError),
}

impl ListenError {
    /// Creates a transformation failure.
    pub fn transform(err: impl Into<BoxError>) -> Self {
        ListenError::Transform(err.into())
    }

    /// Returns the decode report carried by this error.
    ///
    /// For combined failures this is the report of the first source that
    /// failed to decode.
    pub fn decode_report(&self) -> Option<&DecodeFailureReport> {
        match self {
            ListenError::Decode(report) => Some(report),
            ListenError::Combined(combined) => combined
                .failures()
                .iter()
                .find_map(|f| f.error.decode_report()),
            _ => None,
        }
    }

    /// Returns true if a transport failure caused this error.
    pub fn is_transport(&self) -> bool {
        match self {
            ListenError::Transport(_) => true,
            ListenError::Combined(combined) => {
                combined.failures().iter().any(|f| f.error.is_transport())
            }
            _ => false,
        }
    }
}

/// Invalid configuration values.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Decode failure threshold outside `(0, 1]`.
    #[error("decode failure threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Invalid collection or document paths.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path (or one of its segments) is empty.
    #[error("empty path segment in {0:?}")]
    EmptySegment(String),
    /// A collection path must have an odd number of segments.
    #[error("{0:?} is not a collection path")]
    NotACollection(String),
    /// A document id may not contain '/'.
    #[error("invalid document id {0:?}")]
    InvalidDocumentId(String),
}
