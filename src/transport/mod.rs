//! Casting service transport boundary
//!
//! The actual network engineering (connection establishment, authentication,
//! the service wire protocol, retry and backpressure handling) lives in an
//! externally maintained transport component. This module defines the
//! capability interface the adapter speaks to it through; the concrete
//! binding over a dynamically loaded shared library lives in [`loader`].
//!
//! The interface is deliberately narrow: one session per transport handle,
//! synchronous writes that borrow the caller's buffer, and a free-form
//! last-error string for diagnostics.

mod loader;

pub use loader::{NativeTransport, TRANSPORT_LIBRARY_ENV};

use thiserror::Error;

/// Parameters for establishing a cast session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Service account identifier.
    pub username: String,
    /// Matching secret.
    pub password: String,
    /// Channel identifier presented to the service.
    pub channel: String,
    /// Nominal interval between video frames, in nanoseconds.
    pub video_frame_interval_ns: i64,
    /// Nominal interval between audio frames, in nanoseconds.
    pub audio_frame_interval_ns: i64,
}

/// Identifiers returned by the service on session establishment.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Peer token assigned to this session.
    pub peer_token: String,
    /// Channel id the session was bound to.
    pub channel_id: String,
}

/// Errors surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport shared library could not be loaded.
    #[error("failed to load transport library '{library}': {source}")]
    LoadFailed {
        /// Library name or path that was attempted.
        library: String,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// A required entry point is missing from the loaded library.
    #[error("transport library is missing entry point {symbol}: {source}")]
    SymbolMissing {
        /// Name of the unresolved entry point.
        symbol: &'static str,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// The service declined to create a session.
    #[error("session creation failed with status {status}")]
    SessionRejected {
        /// Non-zero status code returned by the transport.
        status: i64,
    },

    /// A media write was rejected.
    #[error("media write rejected with status {status}")]
    WriteRejected {
        /// Non-zero status code returned by the transport.
        status: i64,
    },
}

impl TransportError {
    /// Whether this error means no usable transport exists at all
    /// (vs a runtime rejection from a loaded one).
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            TransportError::LoadFailed { .. } | TransportError::SymbolMissing { .. }
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// The five operations every cast transport provides.
///
/// # Thread Safety
///
/// The adapter calls `write_video`/`write_audio` from encoder threads while
/// `close` may run on a background shutdown thread, so implementations must
/// be shareable across threads.
pub trait Transport: Send + Sync {
    /// Establish a session with the casting service.
    fn create_session(&self, params: &SessionParams) -> TransportResult<SessionInfo>;

    /// Send one encoded video packet. The buffer is borrowed for the call.
    fn write_video(&self, data: &[u8], timestamp_ms: u64) -> TransportResult<()>;

    /// Send one encoded audio packet. The buffer is borrowed for the call.
    fn write_audio(&self, data: &[u8], timestamp_ms: u64) -> TransportResult<()>;

    /// Tear down the session. Safe to call when no session is open.
    fn close(&self);

    /// Human-readable description of the transport's most recent failure.
    fn last_error(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = TransportError::SessionRejected { status: -3 };
        assert!(!err.is_load_failure());

        let err = TransportError::SymbolMissing {
            symbol: "CastWriteVideo",
            source: libloading::Error::DlSymUnknown,
        };
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::SessionRejected { status: 7 };
        assert!(err.to_string().contains("status 7"));

        let err = TransportError::WriteRejected { status: -1 };
        assert!(err.to_string().contains("status -1"));
    }
}
