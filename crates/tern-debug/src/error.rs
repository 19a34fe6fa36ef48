use thiserror::Error;

use tern_jdwp::ErrorCode;

pub type DebugResult<T> = Result<T, DebugError>;

/// Engine error taxonomy.
///
/// Every variant maps to a fixed JDWP error code via [`DebugError::error_code`]
/// and carries the offending identifier or a diagnostic payload. Recoverable
/// variants become per-command wire error replies at the command boundary;
/// [`DebugError::Internal`] means protocol invariants can no longer be trusted
/// and the debugging session must terminate.
#[derive(Debug, Error)]
pub enum DebugError {
    #[error("invalid object id {0} (unknown, collected, or of a different kind)")]
    InvalidObject(u64),
    #[error("invalid thread id {0}")]
    InvalidThread(u64),
    #[error("invalid thread group id {0}")]
    InvalidThreadGroup(u64),
    #[error("invalid class id {0}")]
    InvalidClass(u64),
    #[error("invalid class loader id {0}")]
    InvalidClassLoader(u64),
    #[error("invalid array id {0}")]
    InvalidArray(u64),
    #[error("invalid method id {0}")]
    InvalidMethod(u64),
    #[error("invalid field id {0}")]
    InvalidField(u64),
    #[error("invalid frame id {0}")]
    InvalidFrame(u64),
    #[error("instruction index {index} out of range for method {method_id}")]
    InvalidLocation { method_id: u64, index: u64 },
    #[error("no debug information for method {0}")]
    AbsentInformation(u64),
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("invalid count {0}")]
    InvalidCount(i64),
    #[error("unsupported command")]
    NotImplemented,
    #[error("internal error: {0}")]
    Internal(String),
}

impl DebugError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DebugError::InvalidObject(_) => ErrorCode::InvalidObject,
            DebugError::InvalidThread(_) => ErrorCode::InvalidThread,
            DebugError::InvalidThreadGroup(_) => ErrorCode::InvalidThreadGroup,
            DebugError::InvalidClass(_) => ErrorCode::InvalidClass,
            DebugError::InvalidClassLoader(_) => ErrorCode::InvalidClassLoader,
            DebugError::InvalidArray(_) => ErrorCode::InvalidArray,
            DebugError::InvalidMethod(_) => ErrorCode::InvalidMethodId,
            DebugError::InvalidField(_) => ErrorCode::InvalidFieldId,
            DebugError::InvalidFrame(_) => ErrorCode::InvalidFrameId,
            DebugError::InvalidLocation { .. } => ErrorCode::InvalidLocation,
            DebugError::AbsentInformation(_) => ErrorCode::AbsentInformation,
            DebugError::IllegalArgument(_) => ErrorCode::IllegalArgument,
            DebugError::InvalidCount(_) => ErrorCode::InvalidCount,
            DebugError::NotImplemented => ErrorCode::NotImplemented,
            DebugError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the session can continue after replying with this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DebugError::Internal(_))
    }
}
