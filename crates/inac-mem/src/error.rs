//! Error types for the `inac` memory primitives.
//!
//! Every fallible arena, string and list operation returns [`Result`]. Each
//! [`Error`] also maps onto a coarse [`ErrorCode`] (subject x adjective) that
//! packs into a single `u64` for callers that bridge to integer return codes.

use std::fmt;

/// Errors produced by arenas, pooled strings and node lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The global allocator could not provide memory.
    OutOfMemory,

    /// A fixed arena has no room left for the request.
    PoolFull {
        /// The (aligned) requested size.
        requested: usize,
        /// The free bytes left in the active chunk.
        available: usize,
    },

    /// A caller-supplied value was rejected.
    InvalidArgument {
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A type needs a stricter alignment than the arena provides.
    InvalidAlignment {
        /// The requested alignment.
        alignment: usize,
    },

    /// A name or path does not fit the platform buffer that must hold it.
    BufferTooSmall {
        /// Bytes needed.
        required: usize,
        /// Bytes the platform allows.
        available: usize,
    },

    /// An operating-system call failed.
    Os {
        /// The operation that failed.
        operation: &'static str,
        /// The raw OS error number, when the platform reported one.
        code: Option<i32>,
        /// The platform's description of the failure.
        message: String,
    },

    /// String contents were not valid UTF-8.
    InvalidUtf8,
}

impl Error {
    /// Wraps an I/O error raised by `operation`.
    pub(crate) fn os(operation: &'static str, err: &std::io::Error) -> Self {
        Error::Os {
            operation,
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    /// Returns the coarse subject/adjective code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        let (subject, adjective) = match self {
            Error::OutOfMemory => (Subject::Memory, Adjective::OutOf),
            Error::PoolFull { .. } => (Subject::Pool, Adjective::Full),
            Error::InvalidArgument { .. } => (Subject::Argument, Adjective::Invalid),
            Error::InvalidAlignment { .. } => (Subject::Argument, Adjective::NotAligned),
            Error::BufferTooSmall { .. } => (Subject::Buffer, Adjective::TooSmall),
            Error::Os { .. } => (Subject::Operation, Adjective::Failed),
            Error::InvalidUtf8 => (Subject::String, Adjective::Invalid),
        };
        ErrorCode { subject, adjective }
    }

    /// Returns `true` for resource exhaustion (`POOL`/`MEMORY` subjects).
    ///
    /// These are recoverable by choosing another strategy or a larger pool;
    /// argument errors indicate a caller bug.
    #[must_use]
    pub fn is_exhaustion(&self) -> bool {
        matches!(self.code().subject, Subject::Pool | Subject::Memory)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::PoolFull {
                requested,
                available,
            } => {
                write!(
                    f,
                    "Pool full: requested {requested} bytes, available {available} bytes"
                )
            }
            Error::InvalidArgument { reason } => {
                write!(f, "Invalid argument: {reason}")
            }
            Error::InvalidAlignment { alignment } => {
                write!(
                    f,
                    "Invalid alignment: {alignment} exceeds the arena alignment"
                )
            }
            Error::BufferTooSmall {
                required,
                available,
            } => {
                write!(
                    f,
                    "Buffer too small: {required} bytes required, {available} available"
                )
            }
            Error::Os {
                operation,
                code: Some(code),
                message,
            } => write!(f, "{operation} failed (os error {code}): {message}"),
            Error::Os {
                operation,
                code: None,
                message,
            } => write!(f, "{operation} failed: {message}"),
            Error::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for `inac-mem` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What a failure is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Subject {
    Argument = 2,
    Memory = 14,
    Pool = 16,
    String = 21,
    Buffer = 32,
    Operation = 38,
}

/// How the subject failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adjective {
    Failed,
    Full,
    Invalid,
    NotAligned,
    OutOf,
    TooSmall,
}

impl Adjective {
    const NEGATE: u64 = 1 << 15;

    const fn bits(self) -> u64 {
        match self {
            Adjective::Failed => 43 << 16,
            Adjective::Full => 49 << 16,
            Adjective::Invalid => (147 << 16) | Self::NEGATE,
            Adjective::NotAligned => (4 << 16) | Self::NEGATE,
            Adjective::OutOf => 83 << 16,
            Adjective::TooSmall => 131 << 16,
        }
    }
}

/// A subject x adjective failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    pub subject: Subject,
    pub adjective: Adjective,
}

impl ErrorCode {
    /// Bit set on every failure code. Success is `0`.
    pub const ERROR_BIT: u64 = 1 << 63;

    /// Packs the code: error flag at bit 63, adjective at bits 15..24,
    /// subject at bits 0..15.
    #[must_use]
    pub const fn packed(self) -> u64 {
        Self::ERROR_BIT | self.adjective.bits() | self.subject as u64
    }
}

/// Unwraps `result`, aborting the process if it failed.
///
/// This is the only path in the crate that aborts. Use it where a failure
/// cannot be handled meaningfully, e.g. allocating bootstrap structures.
pub fn must_succeed<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            inac_log::error!(
                "must-succeed operation failed: {err} (code {:#018x})",
                err.code().packed()
            );
            std::process::abort();
        }
    }
}
