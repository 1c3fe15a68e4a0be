//! # cast-output
//!
//! Output adapter binding a live production host's encoded media pipeline
//! to a remote casting service.
//!
//! The hard engineering (the service wire protocol, authentication, retry
//! and backpressure) lives in an externally maintained transport library;
//! this crate is the orchestration glue between it and the host:
//!
//! ```text
//! CastOutput
//!   ├─> Host boundary (encoder access, credentials, capture control)
//!   ├─> Encoder override (service bitrate ceiling, low-latency bundle)
//!   ├─> Packet relay (header priming, audio gating, tick -> ms rescale)
//!   └─> Transport (five entry points of the loaded service library)
//! ```
//!
//! # Data Flow
//!
//! **Control path:** host management thread → `start`/`stop` → transport
//! session lifecycle
//!
//! **Data path:** host encoder threads → `handle_packet` → relay →
//! `write_video`/`write_audio`
//!
//! # Ordering Guarantees
//!
//! The relay captures the video codec configuration record from the first
//! video packet of a session, replays it before every keyframe, and drops
//! audio until the first video packet has been sent, so the service always
//! receives decodable video before any audio.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Output option management
pub mod config;

/// Host application boundary traits and packet types
pub mod host;

/// Lifecycle controller, encoder override, and packet relay
pub mod output;

/// Casting service transport boundary
pub mod transport;

pub use config::OutputOptions;
pub use host::{Credentials, EncoderPacket, OutputCallbacks, OutputHost, PacketKind, VideoInfo};
pub use output::{CastOutput, LifecycleState, OutputError, RelayStats};
pub use transport::{SessionInfo, SessionParams, Transport, TransportError};
