//! Error types shared by every component.

// ── Validation ─────────────────────────────────────────────────────────────

/// Invariant violated by a distance matrix or observation mask.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Matrix has no rows.
    Empty,
    /// Matrix is not square.
    NotSquare {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },
    /// Entry is NaN or infinite.
    NonFinite {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
    },
    /// `|D_ij - D_ji|` exceeds the symmetry tolerance.
    Asymmetric {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
        /// Observed absolute deviation.
        deviation: f64,
    },
    /// Squared distance is negative.
    NegativeEntry {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
        /// Offending value.
        value: f64,
    },
    /// Self-distance is not exactly zero.
    NonZeroDiagonal {
        /// Diagonal index.
        index: usize,
        /// Offending value.
        value: f64,
    },
    /// Mask shape differs from the distance matrix shape.
    MaskShape {
        /// Shape of the distance matrix.
        expected: (usize, usize),
        /// Shape of the mask.
        got: (usize, usize),
    },
    /// Mask entry `(i, j)` differs from `(j, i)`.
    MaskAsymmetric {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
    },
    /// Self-distance is marked as missing.
    MaskDiagonalUnobserved {
        /// Diagonal index.
        index: usize,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "matrix is empty"),
            Self::NotSquare { rows, cols } => {
                write!(f, "matrix is not square: {}x{}", rows, cols)
            }
            Self::NonFinite { row, col } => write!(f, "non-finite entry at ({}, {})", row, col),
            Self::Asymmetric {
                row,
                col,
                deviation,
            } => write!(
                f,
                "matrix is not symmetric at ({}, {}): deviation {:.3e}",
                row, col, deviation
            ),
            Self::NegativeEntry { row, col, value } => {
                write!(f, "negative squared distance {} at ({}, {})", value, row, col)
            }
            Self::NonZeroDiagonal { index, value } => {
                write!(f, "diagonal entry {} is {} instead of 0", index, value)
            }
            Self::MaskShape { expected, got } => write!(
                f,
                "mask shape {}x{} does not match matrix shape {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
            Self::MaskAsymmetric { row, col } => {
                write!(f, "mask is not symmetric at ({}, {})", row, col)
            }
            Self::MaskDiagonalUnobserved { index } => {
                write!(f, "mask diagonal entry {} is not observed", index)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// ── Crate error ────────────────────────────────────────────────────────────

/// Errors returned by completion, embedding, denoising and alignment.
#[derive(Debug, Clone, PartialEq)]
pub enum EdmError {
    /// Malformed distance matrix or mask.
    Validation(ValidationError),
    /// Requested embedding needs the square root of a negative eigenvalue.
    Embedding {
        /// Position of the offending value in descending order.
        index: usize,
        /// The eigenvalue.
        eigenvalue: f64,
    },
    /// Parameter outside its domain.
    InvalidArgument {
        /// Parameter name.
        arg: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Two operands that must share a shape do not.
    DimensionMismatch {
        /// Expected `(rows, cols)`.
        expected: (usize, usize),
        /// Provided `(rows, cols)`.
        got: (usize, usize),
    },
    /// Dense eigen/singular value decomposition did not converge.
    Decomposition {
        /// Which decomposition failed.
        what: &'static str,
    },
}

impl std::fmt::Display for EdmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation error: {}", e),
            Self::Embedding { index, eigenvalue } => write!(
                f,
                "embedding error: eigenvalue #{} is negative ({:.3e})",
                index, eigenvalue
            ),
            Self::InvalidArgument { arg, reason } => {
                write!(f, "invalid argument `{}`: {}", arg, reason)
            }
            Self::DimensionMismatch { expected, got } => write!(
                f,
                "dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, got.0, got.1
            ),
            Self::Decomposition { what } => write!(f, "{} did not converge", what),
        }
    }
}

impl std::error::Error for EdmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for EdmError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, EdmError>;

pub(crate) fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> EdmError {
    EdmError::InvalidArgument {
        arg,
        reason: reason.into(),
    }
}
