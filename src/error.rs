// Error taxonomy for the bridge layer

use std::fmt;

use crate::value::Kind;

/// Error type for bridge operations.
///
/// Every detectable failure is reported through this enum and propagated to
/// the host's error path via `Result`; the bridge never attempts partial
/// recovery. Use-after-reclaim is deliberately *not* represented here: it is
/// prevented by the protection discipline, not detected after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Coercion requested between kinds with no conversion path
    TypeMismatch {
        /// Kind of the value that was supplied
        from: Kind,
        /// Kind that was requested
        to: Kind,
    },

    /// Protect/unprotect counts mismatched, detected at a call or frame
    /// boundary. A defect in the native routine, surfaced rather than
    /// silently corrected.
    StackImbalance {
        /// Stack depth the boundary expected
        expected: usize,
        /// Stack depth actually observed
        actual: usize,
    },

    /// A count, handle, or argument was invalid; no partial allocation was
    /// performed
    InvalidArgument(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::TypeMismatch { from, to } => {
                write!(f, "cannot coerce {} to {}", from, to)
            }
            BridgeError::StackImbalance { expected, actual } => {
                write!(
                    f,
                    "protection stack imbalance: expected depth {}, found {}",
                    expected, actual
                )
            }
            BridgeError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_type_mismatch() {
        let err = BridgeError::TypeMismatch {
            from: Kind::List,
            to: Kind::Real,
        };
        assert_eq!(format!("{}", err), "cannot coerce list to real");
    }

    #[test]
    fn test_display_stack_imbalance() {
        let err = BridgeError::StackImbalance {
            expected: 2,
            actual: 5,
        };
        assert!(format!("{}", err).contains("expected depth 2"));
    }
}
