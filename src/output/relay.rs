//! Packet relay
//!
//! Forwards encoded packets from the host to the transport, enforcing the
//! ordering the casting service needs to start decoding:
//!
//! - the video codec configuration record is captured from the encoder on
//!   the first video packet of a session and re-sent as a synthetic
//!   zero-timestamp packet immediately before every keyframe;
//! - audio is suppressed until at least one video packet has gone out, so
//!   the service never sees audio before the video initialization data;
//! - presentation timestamps are rescaled from encoder ticks to
//!   milliseconds on the way through.
//!
//! The relay runs on whatever threads the host uses for encoder callbacks.
//! Video and audio may be delivered from different threads, so the
//! sequencing state sits behind a mutex. Packet buffers are borrowed for
//! the duration of each call; only the configuration record is copied.

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::host::{EncoderHandle, EncoderPacket};
use crate::transport::Transport;

/// Relay counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Video packets forwarded.
    pub video_packets: u64,

    /// Audio packets forwarded.
    pub audio_packets: u64,

    /// Configuration records sent ahead of keyframes.
    pub headers_sent: u64,

    /// Audio packets dropped while waiting for the first video packet.
    pub audio_dropped_waiting: u64,

    /// Writes the transport rejected (logged, not fatal).
    pub write_rejections: u64,
}

/// Sequencing state for the current session.
struct RelayState {
    /// Set at session start, cleared by the first forwarded video packet.
    wait_video: bool,
    /// Whether the configuration record capture has been attempted.
    header_captured: bool,
    /// Buffered codec configuration record, if the encoder had one.
    video_header: Option<Vec<u8>>,
    stats: RelayStats,
}

impl RelayState {
    fn fresh() -> Self {
        Self {
            wait_video: true,
            header_captured: false,
            video_header: None,
            stats: RelayStats::default(),
        }
    }
}

/// Per-session packet relay.
pub struct PacketRelay {
    state: Mutex<RelayState>,
}

impl PacketRelay {
    /// Create a relay in the waiting-for-video state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RelayState::fresh()),
        }
    }

    /// Rearm for a new session: drop the buffered configuration record,
    /// reset the audio gate, and zero the counters.
    pub fn reset(&self) {
        *self.state.lock() = RelayState::fresh();
    }

    /// Whether audio is still being suppressed.
    pub fn waiting_for_video(&self) -> bool {
        self.state.lock().wait_video
    }

    /// Counters for the current session.
    pub fn stats(&self) -> RelayStats {
        self.state.lock().stats
    }

    /// Forward a video packet, priming the configuration record as needed.
    pub fn handle_video(
        &self,
        transport: &dyn Transport,
        encoder: &dyn EncoderHandle,
        packet: &EncoderPacket<'_>,
    ) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.header_captured {
            state.header_captured = true;
            state.video_header = encoder.extra_data().filter(|header| !header.is_empty());
            match &state.video_header {
                Some(header) => {
                    debug!("captured {} byte codec configuration record", header.len());
                }
                None => warn!("encoder reported no codec configuration record"),
            }
        }

        let timestamp_ms = rescale_to_ms(packet.pts, packet.timebase_num, packet.timebase_den);

        if packet.keyframe {
            if let Some(header) = state.video_header.as_deref() {
                if let Err(e) = transport.write_video(header, 0) {
                    warn!("configuration record write rejected: {e}");
                    state.stats.write_rejections += 1;
                }
                state.stats.headers_sent += 1;
            }
        }

        if let Err(e) = transport.write_video(packet.data, timestamp_ms as u64) {
            warn!("video write rejected: {e}");
            state.stats.write_rejections += 1;
        }
        state.stats.video_packets += 1;
        state.wait_video = false;
    }

    /// Forward an audio packet, unless video has not started yet.
    pub fn handle_audio(&self, transport: &dyn Transport, packet: &EncoderPacket<'_>) {
        let mut state = self.state.lock();

        if state.wait_video {
            state.stats.audio_dropped_waiting += 1;
            trace!("dropping audio packet ahead of first video packet");
            return;
        }

        let timestamp_ms = rescale_to_ms(packet.pts, packet.timebase_num, packet.timebase_den);
        if let Err(e) = transport.write_audio(packet.data, timestamp_ms as u64) {
            warn!("audio write rejected: {e}");
            state.stats.write_rejections += 1;
        }
        state.stats.audio_packets += 1;
    }
}

impl Default for PacketRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a presentation timestamp from encoder ticks to milliseconds.
///
/// A zero denominator yields 0 rather than a panic on a malformed packet.
pub fn rescale_to_ms(pts: i64, timebase_num: u32, timebase_den: u32) -> i64 {
    if timebase_den == 0 {
        return 0;
    }
    pts * 1000 * i64::from(timebase_num) / i64::from(timebase_den)
}
