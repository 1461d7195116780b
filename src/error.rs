//! Error types for syncbell.
//!
//! All errors are strongly typed using thiserror, one enum per concern,
//! so callers can pattern match on specific failure conditions. No error
//! in this crate is fatal to the hosting process.

use thiserror::Error;

use crate::cursor::ColumnType;
use crate::registry::SubscribeMode;

/// Errors raised while encoding or decoding wire parcels.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Buffer underflow: needed {needed} more bytes, {remaining} remaining")]
    BufferUnderflow {
        needed: usize,
        remaining: usize,
    },

    #[error("Declared length {declared} exceeds remaining input of {remaining} bytes")]
    LengthOverrun {
        declared: usize,
        remaining: usize,
    },

    #[error("Unknown value tag: {tag:#04x}")]
    UnknownTag {
        tag: u8,
    },

    #[error("Value {value} is out of range for {what}")]
    EnumOutOfRange {
        what: &'static str,
        value: i32,
    },

    #[error("Invalid boolean byte: {byte:#04x}")]
    InvalidBool {
        byte: u8,
    },

    #[error("String field is not valid UTF-8: {message}")]
    InvalidUtf8 {
        message: String,
    },
}

/// Errors raised by the notifier service stub and proxy.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Caller presented an invalid interface token")]
    UnauthorizedCaller,

    #[error("Unknown opcode: {code}")]
    UnknownOpcode {
        code: u32,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] CodecError),

    #[error("Remote rejected the request with status {status}")]
    Rejected {
        status: i32,
    },
}

/// Errors raised by the observer registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Observer is already registered for store '{store}' in mode {mode:?}")]
    AlreadyRegistered {
        store: String,
        mode: SubscribeMode,
    },

    #[error("Subscription is not registered")]
    NotRegistered,

    #[error("Owning execution context is torn down")]
    ContextTornDown,
}

/// Errors raised by delivery queues and execution contexts.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Execution context is torn down")]
    ContextTornDown,

    #[error("Delivery queue is retired")]
    Retired,
}

/// Transport errors for the remote call seam.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport disconnected: {message}")]
    Disconnected {
        message: String,
    },

    #[error("Frame magic mismatch")]
    BadMagic,

    #[error("Unsupported frame version: {version}")]
    UnsupportedVersion {
        version: u8,
    },

    #[error("Frame payload of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        len: usize,
        max: usize,
    },

    #[error("Frame checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        stored: u32,
        computed: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by row cursors.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Column index {index} is out of bounds ({count} columns)")]
    ColumnOutOfBounds {
        index: usize,
        count: usize,
    },

    #[error("No column named '{name}'")]
    UnknownColumn {
        name: String,
    },

    #[error("Row position {position} is out of bounds ({count} rows)")]
    RowOutOfBounds {
        position: usize,
        count: usize,
    },

    #[error("Cursor is not positioned on a row")]
    NotPositioned,

    #[error("Column {index} holds {actual:?}, expected {expected:?}")]
    TypeMismatch {
        index: usize,
        expected: ColumnType,
        actual: ColumnType,
    },
}

/// Top-level error type for syncbell.
///
/// This enum encompasses all possible errors that can occur
/// when using the subsystem.
#[derive(Debug, Error)]
pub enum SyncbellError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),
}

impl SyncbellError {
    /// Returns true if this is a codec error.
    #[must_use]
    pub const fn is_codec(&self) -> bool {
        matches!(self, Self::Codec(_))
    }

    /// Returns true if this is a service error.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Returns true if this is a registry error.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Only transport-level connection failures are worth retrying; codec,
    /// authorization, and registry failures will not change on a second
    /// attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => matches!(
                e,
                TransportError::Disconnected { .. } | TransportError::Io(_)
            ),
            _ => false,
        }
    }
}

/// Result type alias for syncbell operations.
pub type SyncbellResult<T> = Result<T, SyncbellError>;
