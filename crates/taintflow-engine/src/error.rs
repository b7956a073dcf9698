//! Host-call error taxonomy.
//!
//! This subsystem has no user-input failure modes: minting and label
//! construction are total, and internal invariant violations abort
//! instead of surfacing as errors.  The one thing a script-visible caller
//! can get wrong is invoking a capability operation on the wrong kind of
//! receiver, reported through the host runtime's ordinary type-error
//! convention.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by a script-visible host call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HostError {
    /// The receiver of a native method is not the expected kind of object.
    #[error("type error: '{operation}' requires a {expected} receiver (got {actual})")]
    ReceiverTypeMismatch {
        /// The native operation that was invoked.
        operation: String,
        /// What the receiver should have been (e.g. `SecurityTag`).
        expected: String,
        /// Type name of the receiver actually passed.
        actual: String,
    },
}
