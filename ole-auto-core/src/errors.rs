use thiserror::Error;

/// Result type alias for wrapper-core operations.
pub type AutoResult<T> = Result<T, AutoError>;

/// Centralized error enum for the wrapping core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutoError {
    /// A loosely-typed native value could not be coerced to the requested
    /// scalar type. Raised instead of a silent default: a wrong zero or
    /// false is considered worse than a visible failure.
    #[error("cannot convert {found} to {target}")]
    Conversion {
        /// Shape of the value that arrived from the native side.
        found: &'static str,
        /// The scalar type the caller asked for.
        target: &'static str,
    },

    /// Mutation attempted on a container that has already been torn down.
    #[error("disposable list has already been disposed")]
    AlreadyDisposed,

    /// A single native release reported a failure.
    #[error("native release failed: {0}")]
    Release(String),

    /// Full teardown completed, but one or more members failed to release.
    /// Every member was still given a chance to release before this was
    /// raised; the failures are carried in insertion order.
    #[error("release failed for {} of {attempted} resources", .failures.len())]
    ReleaseAggregate {
        /// How many resources the teardown attempted to release.
        attempted: usize,
        /// Every collected per-resource failure.
        failures: Vec<ReleaseFailure>,
    },
}

/// One failed release inside an aggregate teardown report.
#[derive(Debug, Error)]
#[error("resource #{index}: {source}")]
pub struct ReleaseFailure {
    /// Insertion-order position of the failing resource.
    pub index: usize,
    /// The underlying release error.
    #[source]
    pub source: AutoError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_names_both_sides() {
        let err = AutoError::Conversion {
            found: "Null",
            target: "f64",
        };
        assert_eq!(err.to_string(), "cannot convert Null to f64");
    }

    #[test]
    fn aggregate_error_counts_failures() {
        let err = AutoError::ReleaseAggregate {
            attempted: 3,
            failures: vec![ReleaseFailure {
                index: 1,
                source: AutoError::Release("refused".into()),
            }],
        };
        assert_eq!(err.to_string(), "release failed for 1 of 3 resources");
    }
}
