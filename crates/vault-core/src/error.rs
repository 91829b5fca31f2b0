//! Error kinds shared across the reader, item/router, and RAR subsystems.
//!
//! See spec §7: four kinds, no automatic retry at this layer. Callers that
//! want retries (e.g. a CLI) build that policy on top of `CoreError`.

use thiserror::Error;

/// Errors raised by `vault-core` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing required input: a HEAD response without a valid
    /// `Content-Length`, a RAR magic mismatch, a second `seek`, reading a
    /// non-readable item, streaming a non-streamable one, or a failed
    /// recovery-record alignment check.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The container (RAR archive) could not be parsed or followed: a header
    /// parse failure, a missing successor volume, a volume signature
    /// mismatch, or a filename mismatch across volumes.
    #[error("bad container: {0}")]
    BadContainer(String),

    /// A transient condition in an HTTP worker (body ended before a piece
    /// filled, range boundary not found). Logged by the worker; the caller
    /// normally never observes this directly, but it is exposed so a reader
    /// can record the failure on the affected piece.
    #[error("transient: {0}")]
    Transient(String),

    /// The operation was aborted by `close()`. Never surfaced as a read
    /// error: readers convert this into an empty-read / `FINISHED` outcome.
    #[error("cancelled")]
    Cancelled,

    /// Wraps lower-level I/O failures (local file access, HTTP transport)
    /// that don't fit one of the above kinds.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A libcurl call failed (bad handle option, transport error).
    #[error(transparent)]
    Curl(#[from] curl::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
