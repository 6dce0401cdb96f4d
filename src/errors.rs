use thiserror::Error;

/// Transport-level failure reported by a single backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("read failed: {message}")]
    Read { message: String, transient: bool },

    #[error("write failed: {message}")]
    Write { message: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
}

impl BackendError {
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
            transient: false,
        }
    }

    pub fn read_transient(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
            transient: true,
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    /// Only transient reads may be retried; mutations never are.
    pub fn is_transient_read(&self) -> bool {
        matches!(self, Self::Read { transient: true, .. })
    }
}

/// Terminal classification of one relocation attempt.
///
/// `Failed` and `Partial` are reported distinctly because the recovery action
/// differs: a failed relocation can be retried whole, a partial one needs a
/// manual fix before anything is retried.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// Rejected before any backend call; never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Zero matches. Terminal and reported, but not an exceptional condition.
    #[error("no pending row matched '{keyword}'")]
    NoMatch { keyword: String },

    #[error("relocation cancelled before execution")]
    Cancelled,

    /// Nothing was moved.
    #[error("relocation failed with no changes applied")]
    Failed(#[source] BackendError),

    /// Data moved but a later write failed. Relocation is not idempotent, so
    /// the operation must not be replayed; recovery is manual.
    #[error("relocation partially applied: {detail}")]
    Partial {
        detail: String,
        #[source]
        source: BackendError,
    },
}
