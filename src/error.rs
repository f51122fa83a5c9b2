/// Error types for LiveFrame
///
/// Every fallible operation in the crate returns [`FrameError`]. The
/// endpoint layer uses [`FrameError::kind`] to decide how an error is
/// reported to the caller; nothing inside the core retries or recovers.

use thiserror::Error;

use crate::value::DType;

/// Broad classification of a [`FrameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid construction-time configuration (unknown backend, bad env var)
    Configuration,
    /// Operands of unequal length
    ShapeMismatch,
    /// A column, key, row position, frame or store does not exist
    NotFound,
    /// An edit predicate matched no row
    AmbiguousMatch,
    /// Operation not defined for the value types involved
    Type,
    /// Malformed request or frame definition
    Invalid,
    /// A reactive computation failed
    Reaction,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("unknown backend '{0}', expected 'pandas' or 'arrow'")]
    UnknownBackend(String),

    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("key {key} not found in column '{column}'")]
    KeyNotFound { column: String, key: String },

    #[error("index {index} out of range [0, {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("dataframe {0} not found")]
    FrameNotFound(String),

    #[error("store {0} not found")]
    StoreNotFound(String),

    #[error("row with id {value} not found in column '{column}'")]
    NoMatchingRow { column: String, value: String },

    #[error("type mismatch in {op}: {left:?} and {right:?}")]
    TypeMismatch {
        op: &'static str,
        left: DType,
        right: DType,
    },

    #[error("{op} is not supported for {dtype:?} columns")]
    Unsupported { op: &'static str, dtype: DType },

    #[error("cannot store {found:?} value in {expected:?} column")]
    InvalidValue { expected: DType, found: DType },

    #[error("{0} of empty column")]
    EmptyData(&'static str),

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("primary key '{column}' holds {key} more than once")]
    DuplicateKey { column: String, key: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("reaction '{0}' would create a dependency cycle")]
    CyclicGraph(String),

    #[error("reaction '{name}' failed: {message}")]
    Reaction { name: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::UnknownBackend(_) | FrameError::Config(_) => ErrorKind::Configuration,
            FrameError::LengthMismatch { .. } => ErrorKind::ShapeMismatch,
            FrameError::ColumnNotFound(_)
            | FrameError::KeyNotFound { .. }
            | FrameError::IndexOutOfBounds { .. }
            | FrameError::FrameNotFound(_)
            | FrameError::StoreNotFound(_) => ErrorKind::NotFound,
            FrameError::NoMatchingRow { .. } => ErrorKind::AmbiguousMatch,
            FrameError::TypeMismatch { .. }
            | FrameError::Unsupported { .. }
            | FrameError::InvalidValue { .. }
            | FrameError::EmptyData(_) => ErrorKind::Type,
            FrameError::DuplicateColumn(_)
            | FrameError::DuplicateKey { .. }
            | FrameError::InvalidRequest(_)
            | FrameError::CyclicGraph(_) => ErrorKind::Invalid,
            FrameError::Reaction { .. } => ErrorKind::Reaction,
        }
    }

    pub(crate) fn index(index: usize, len: usize) -> Self {
        FrameError::IndexOutOfBounds { index, len }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A non-fatal condition raised while computing a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackWarning {
    /// The backend has no native kernel for `operation`; an equivalent
    /// generic procedure was used instead.
    #[error("the {backend} backend does not support {operation} natively; computed by a generic fallback")]
    NoNativeKernel {
        backend: &'static str,
        operation: &'static str,
    },
}

/// A value together with the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Warned<T> {
    value: T,
    warnings: Vec<FallbackWarning>,
}

impl<T> Warned<T> {
    pub fn clean(value: T) -> Self {
        Warned {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(value: T, warning: FallbackWarning) -> Self {
        log::warn!("{}", warning);
        Warned {
            value,
            warnings: vec![warning],
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn warnings(&self) -> &[FallbackWarning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            FrameError::UnknownBackend("torch".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            FrameError::LengthMismatch { expected: 3, actual: 2 }.kind(),
            ErrorKind::ShapeMismatch
        );
        assert_eq!(FrameError::ColumnNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            FrameError::NoMatchingRow {
                column: "id".into(),
                value: "7".into()
            }
            .kind(),
            ErrorKind::AmbiguousMatch
        );
    }

    #[test]
    fn test_error_messages() {
        let err = FrameError::NoMatchingRow {
            column: "id".into(),
            value: "7".into(),
        };
        assert_eq!(err.to_string(), "row with id 7 not found in column 'id'");
        assert_eq!(
            FrameError::index(5, 3).to_string(),
            "index 5 out of range [0, 3)"
        );
    }

    #[test]
    fn test_warned() {
        let plain = Warned::clean(2.5);
        assert!(!plain.has_warnings());
        assert_eq!(plain.into_inner(), 2.5);

        let warned = Warned::with_warning(
            1.0,
            FallbackWarning::NoNativeKernel {
                backend: "arrow",
                operation: "median",
            },
        );
        assert_eq!(warned.warnings().len(), 1);
        assert_eq!(*warned.value(), 1.0);
    }
}
