//! Error types for the score tree
//!
//! Defines the error hierarchy for tree edits, spanner registry calls,
//! indicator queries and rendering. Validation errors are raised before any
//! mutation happens; `MalformedTree` signals a broken invariant (a bug in an
//! edit operation) and should abort the surrounding edit transaction.

use thiserror::Error;

use crate::models::{ComponentId, IndicatorKind, SpannerId};

/// Result alias used across the crate
pub type ScoreResult<T> = Result<T, ScoreError>;

/// Top-level error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    /// Empty, duplicate-containing or out-of-order leaf sequence
    #[error("Invalid spanner range: {0}")]
    InvalidSpannerRange(String),

    /// Components are not a contiguous run in one logical voice
    #[error("Non-contiguous components: {0}")]
    NonContiguousComponents(String),

    /// Graft or splice of a component that already has a parent
    #[error("Component {0} is already attached to a parent")]
    AlreadyAttached(ComponentId),

    /// Query expected exactly one indicator and found none
    #[error("Component {component} has no {kind:?} indicator")]
    MissingIndicator {
        component: ComponentId,
        kind: IndicatorKind,
    },

    /// Query expected exactly one indicator and found several
    #[error("Component {component} has {count} {kind:?} indicators, expected one")]
    ExtraIndicator {
        component: ComponentId,
        kind: IndicatorKind,
        count: usize,
    },

    /// Internal consistency check failed (should be unreachable)
    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    /// Handle refers to a freed slot or a slot reused by a newer component
    #[error("Stale component handle {0}")]
    StaleComponent(ComponentId),

    /// Spanner handle refers to a deleted spanner
    #[error("Stale spanner handle {0}")]
    StaleSpanner(SpannerId),

    #[error("Component {0} is not a leaf")]
    NotALeaf(ComponentId),

    #[error("Component {0} is not a container")]
    NotAContainer(ComponentId),

    /// Zero, negative or otherwise unusable duration
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Index {index} out of range for {len} children of {container}")]
    IndexOutOfRange {
        container: ComponentId,
        index: usize,
        len: usize,
    },

    /// Graft target lies inside the subtree being grafted
    #[error("Cannot graft {subtree} into its own descendant {target}")]
    CyclicGraft {
        subtree: ComponentId,
        target: ComponentId,
    },

    /// Note-entry parse error with location information
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// LilyPond file template failed to compile or render
    #[error("Template rendering failed: {0}")]
    Template(String),

    /// Writing a rendered file failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<mustache::Error> for ScoreError {
    fn from(err: mustache::Error) -> Self {
        ScoreError::Template(err.to_string())
    }
}

impl From<std::io::Error> for ScoreError {
    fn from(err: std::io::Error) -> Self {
        ScoreError::Io(err.to_string())
    }
}

impl ScoreError {
    /// Whether the error is a usage/validation error raised before mutation.
    ///
    /// Validation errors are meant to be handled by the immediate caller;
    /// everything else indicates the tree can no longer be trusted or the
    /// caller handed in a dead handle.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScoreError::InvalidSpannerRange(_)
                | ScoreError::NonContiguousComponents(_)
                | ScoreError::AlreadyAttached(_)
                | ScoreError::InvalidDuration(_)
                | ScoreError::IndexOutOfRange { .. }
                | ScoreError::CyclicGraft { .. }
                | ScoreError::NotALeaf(_)
                | ScoreError::NotAContainer(_)
        )
    }

    /// Whether the error signals a broken invariant
    pub fn is_malformed(&self) -> bool {
        matches!(self, ScoreError::MalformedTree(_))
    }
}
