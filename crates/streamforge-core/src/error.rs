//! The crate-wide error taxonomy.
//!
//! Every fallible public entry point in `streamforge-*` returns
//! `Result<T, Error>`. Variants are grouped by the clusters described in the
//! design notes (contract / resource / format / control / external) but kept
//! as one flat enum so callers can match on a single type.

use thiserror::Error as ThisError;

/// Errors produced anywhere in the pipeline core.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An output pad's `push` was called while unlinked.
    #[error("pad has no link")]
    NoLink,

    /// A trait method was invoked with no implementation for this case;
    /// the framework interprets this as "not handled here" rather than failure.
    #[error("not implemented")]
    NoImpl,

    /// A demuxer found no stream of the requested kind.
    #[error("no such media stream")]
    NoStream,

    /// No decoder was available for the stream's codec.
    #[error("no codec available")]
    NoCodec,

    #[error("unsupported media format")]
    UnsupportedMediaFormat,

    #[error("unsupported pixel format")]
    UnsupportedPixelFormat,

    #[error("unsupported sample format")]
    UnsupportedSampleFormat,

    #[error("unsupported resource type")]
    UnsupportedResource,

    /// Caller passed arguments that are never valid (contract violation).
    #[error("invalid arguments")]
    InvalidArguments,

    /// The pad graph is not a valid DAG (a cycle, or a dangling link).
    #[error("invalid topology")]
    InvalidTopology,

    #[error("invalid context")]
    InvalidContext,

    /// The requested operation is not legal in the element's current state.
    #[error("invalid state")]
    InvalidState,

    #[error("out of memory")]
    OutOfMemory,

    /// The operation is asynchronous; the result will arrive via the bus.
    #[error("operation is asynchronous")]
    Async,

    #[error("internal error: {0}")]
    Internal(String),

    /// Transient failure; retrying later may succeed.
    #[error("temporarily unavailable")]
    TemporarilyUnavailable,

    #[error("file not found")]
    FileNotFound,

    #[error("file corrupted")]
    FileCorrupted,

    /// An interruptible sleep or wait returned early because a task arrived.
    /// Not user-visible: callers should re-check state and continue or exit.
    #[error("interrupted")]
    Interrupted,

    #[error("end of file")]
    EndOfFile,

    /// Wraps an error surfaced by an external collaborator (codec library,
    /// device backend, URL parser).
    #[error("external error: {0}")]
    External(#[source] anyhow::Error),

    #[error("unknown error: {0}")]
    Unknown(#[source] anyhow::Error),
}

impl PartialEq for Error {
    /// Tests compare errors by discriminant, not by wrapped message —
    /// `anyhow::Error` isn't `PartialEq` and the message text isn't part of
    /// the contract.
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Eq for Error {}

/// Which cluster an error belongs to, used by callers deciding how loudly to
/// log or whether to surface a transition as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Contract,
    Resource,
    Format,
    Control,
    External,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        use Error::*;
        match self {
            InvalidArguments | InvalidState | InvalidTopology | InvalidContext | NoLink | NoImpl => {
                ErrorClass::Contract
            }
            OutOfMemory | NoStream | NoCodec | FileNotFound | FileCorrupted
            | TemporarilyUnavailable | EndOfFile => ErrorClass::Resource,
            UnsupportedMediaFormat | UnsupportedPixelFormat | UnsupportedSampleFormat
            | UnsupportedResource => ErrorClass::Format,
            Interrupted | Async => ErrorClass::Control,
            External(_) | Unknown(_) | Internal(_) => ErrorClass::External,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
