//! Error types for filters, models and the renderer boundary
//!
//! Every failure is returned to the caller of the failing operation; the
//! filter never applies a partial update.

use std::fmt;

/// Errors that can occur while filtering
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "control vector", "observation pixel count")
        context: String,
    },

    /// A covariance matrix is not symmetric positive semi-definite
    InvalidCovariance {
        /// Which covariance failed and why
        context: String,
    },

    /// Operation requires an initialized belief
    NotReady,

    /// The renderer collaborator failed to produce a depth buffer
    RenderUnavailable {
        /// Description reported by the renderer
        description: String,
    },

    /// Numerical instability detected (e.g. information matrix lost definiteness)
    NumericalInstability {
        /// Description of the issue
        description: String,
    },

    /// Configuration error
    Configuration {
        /// Description of the configuration issue
        description: String,
    },
}

impl FilterError {
    /// Shorthand for a [`FilterError::DimensionMismatch`].
    pub fn dimension_mismatch(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        FilterError::DimensionMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    /// Shorthand for a [`FilterError::InvalidCovariance`].
    pub fn invalid_covariance(context: impl Into<String>) -> Self {
        FilterError::InvalidCovariance {
            context: context.into(),
        }
    }

    /// Shorthand for a [`FilterError::Configuration`].
    pub fn configuration(description: impl Into<String>) -> Self {
        FilterError::Configuration {
            description: description.into(),
        }
    }

    /// Shorthand for a [`FilterError::RenderUnavailable`].
    pub fn render_unavailable(description: impl Into<String>) -> Self {
        FilterError::RenderUnavailable {
            description: description.into(),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            FilterError::InvalidCovariance { context } => {
                write!(f, "Invalid covariance: {}", context)
            }
            FilterError::NotReady => write!(f, "Filter has no belief yet (not initialized)"),
            FilterError::RenderUnavailable { description } => {
                write!(f, "Renderer unavailable: {}", description)
            }
            FilterError::NumericalInstability { description } => {
                write!(f, "Numerical instability: {}", description)
            }
            FilterError::Configuration { description } => {
                write!(f, "Configuration error: {}", description)
            }
        }
    }
}

impl std::error::Error for FilterError {}

impl From<serde_json::Error> for FilterError {
    fn from(e: serde_json::Error) -> Self {
        FilterError::Configuration {
            description: format!("invalid JSON: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::InvalidCovariance {
            context: "pose block".to_string(),
        };
        assert!(err.to_string().contains("pose block"));

        let err = FilterError::DimensionMismatch {
            expected: 4,
            actual: 6,
            context: "control vector".to_string(),
        };
        assert!(err.to_string().contains("4"));
        assert!(err.to_string().contains("6"));
        assert!(err.to_string().contains("control vector"));
    }

    #[test]
    fn test_not_ready_display() {
        assert!(FilterError::NotReady.to_string().contains("not initialized"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<f64>("not json").unwrap_err();
        let err: FilterError = json_err.into();
        assert!(matches!(err, FilterError::Configuration { .. }));
    }

    #[test]
    fn test_shorthands() {
        assert_eq!(
            FilterError::dimension_mismatch(3, 2, "noise"),
            FilterError::DimensionMismatch {
                expected: 3,
                actual: 2,
                context: "noise".to_string()
            }
        );
        assert!(matches!(
            FilterError::render_unavailable("gpu lost"),
            FilterError::RenderUnavailable { .. }
        ));
    }
}
