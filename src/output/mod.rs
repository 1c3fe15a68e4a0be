//! Output lifecycle controller
//!
//! Orchestrates one cast session per activation: loads the transport,
//! establishes the session with the host's configured credentials,
//! constrains the video encoder, and hands every encoded packet to the
//! relay. The controller itself is purely reactive; the host drives it
//! from its management thread (start/stop) and its encoder threads
//! (packet delivery).
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──> Starting ──ok──> Capturing ──stop──> Stopping ──> Idle
//!                    │
//!                    └──fatal failure──> Errored (absorbing)
//! ```
//!
//! `Errored` is entered when a start attempt fails in a way that leaves the
//! session unusable (missing credentials, missing video info, transport
//! rejection); it blocks further starts until the output is recreated.
//! Host-side declines (capture validation, encoder initialization) return
//! the output to `Idle` so the host may retry.
//!
//! Stopping is asynchronous: `stop` spawns a background thread that ends
//! host data capture and closes the transport session, and returns
//! immediately. The next `start` (or drop) joins that thread first.

mod encoder;
mod relay;

pub use relay::{rescale_to_ms, PacketRelay, RelayStats};

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{
    OutputOptions, AUDIO_FRAME_INTERVAL_NS, CHANNEL_NAME, FALLBACK_VIDEO_FRAME_INTERVAL_NS,
    MAX_FRAME_DIMENSION,
};
use crate::host::{EncoderPacket, OutputCallbacks, OutputHost, PacketKind};
use crate::transport::{NativeTransport, SessionParams, Transport, TransportError};

/// Output name shown by the host.
pub const OUTPUT_NAME: &str = "Remote Cast Output";

/// Identifier the output registers under.
pub const OUTPUT_ID: &str = "cast_output";

/// Video codec the output accepts from the host.
pub const VIDEO_CODEC: &str = "h264";

/// Audio codec the output accepts from the host.
pub const AUDIO_CODEC: &str = "opus";

/// Lifecycle state of a [`CastOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session; ready to start.
    Idle,
    /// A start attempt is in progress.
    Starting,
    /// Session established; packets are flowing.
    Capturing,
    /// Background shutdown in progress.
    Stopping,
    /// A start attempt failed fatally; the output must be recreated.
    Errored,
}

/// Errors from the output lifecycle.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A previous start failed fatally.
    #[error("output previously failed; recreate it before starting again")]
    Errored,

    /// Start was requested while a session is active.
    #[error("output is already active; stop it before starting again")]
    AlreadyActive,

    /// The host has no service credentials configured.
    #[error("no service credentials are configured")]
    MissingCredentials,

    /// The host could not report video pipeline information.
    #[error("host could not report video info")]
    VideoInfoUnavailable,

    /// The casting service declined the session.
    #[error("cast session rejected: {detail}")]
    SessionRejected {
        /// Last-error string fetched from the transport.
        detail: String,
        /// Underlying transport status.
        #[source]
        source: TransportError,
    },

    /// The host declined to begin data capture.
    #[error("host rejected data capture")]
    CaptureRejected,

    /// The host failed to initialize its encoders.
    #[error("host failed to initialize encoders")]
    EncoderInitFailed,

    /// Any other transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl OutputError {
    /// Whether this failure leaves the session unusable (enters the
    /// absorbing error state) as opposed to a host decline the host may
    /// retry after reconfiguring.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OutputError::Errored
                | OutputError::MissingCredentials
                | OutputError::VideoInfoUnavailable
                | OutputError::SessionRejected { .. }
                | OutputError::Transport(_)
        )
    }
}

/// One output activation: a session context binding the host's encoder
/// pipeline to the casting service transport.
pub struct CastOutput<H: OutputHost> {
    host: Arc<H>,
    transport: Arc<dyn Transport>,
    options: OutputOptions,
    relay: PacketRelay,
    state: Arc<Mutex<LifecycleState>>,
    stop_task: Mutex<Option<thread::JoinHandle<()>>>,
    /// Negotiated frame size, recorded at start. Bookkeeping only.
    mode: Mutex<Option<(u32, u32)>>,
}

impl<H: OutputHost> std::fmt::Debug for CastOutput<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastOutput")
            .field("options", &self.options)
            .field("state", &*self.state.lock())
            .field("mode", &*self.mode.lock())
            .finish_non_exhaustive()
    }
}

impl<H: OutputHost> CastOutput<H> {
    /// Create an output backed by the dynamically loaded transport
    /// library named in `options`.
    ///
    /// Fails without producing an instance if the library cannot be
    /// loaded or is missing an entry point.
    pub fn create(host: H, options: OutputOptions) -> Result<Self, TransportError> {
        let transport = NativeTransport::load(&options.transport_library)?;
        Ok(Self::with_transport(host, Arc::new(transport), options))
    }

    /// Create an output over an already constructed transport. Used by
    /// tests and by hosts that link a transport statically.
    pub fn with_transport(host: H, transport: Arc<dyn Transport>, options: OutputOptions) -> Self {
        Self {
            host: Arc::new(host),
            transport,
            options,
            relay: PacketRelay::new(),
            state: Arc::new(Mutex::new(LifecycleState::Idle)),
            stop_task: Mutex::new(None),
            mode: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Options this output was created with.
    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    /// Relay counters for the current session.
    pub fn stats(&self) -> RelayStats {
        self.relay.stats()
    }

    /// Frame size negotiated at the last start, if any.
    pub fn negotiated_mode(&self) -> Option<(u32, u32)> {
        *self.mode.lock()
    }

    /// Establish a session and begin capturing.
    ///
    /// Blocks until any still-running shutdown from a previous session
    /// has finished, then performs the start sequence synchronously.
    pub fn start(&self) -> Result<(), OutputError> {
        match *self.state.lock() {
            LifecycleState::Errored => return Err(OutputError::Errored),
            LifecycleState::Starting | LifecycleState::Capturing => {
                warn!("start requested while the output is active; stop it first");
                return Err(OutputError::AlreadyActive);
            }
            LifecycleState::Stopping | LifecycleState::Idle => {}
        }

        self.join_pending_stop();
        *self.state.lock() = LifecycleState::Starting;

        match self.try_start() {
            Ok(()) => {
                *self.state.lock() = LifecycleState::Capturing;
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = if e.is_fatal() {
                    LifecycleState::Errored
                } else {
                    LifecycleState::Idle
                };
                Err(e)
            }
        }
    }

    fn try_start(&self) -> Result<(), OutputError> {
        let credentials = self
            .host
            .service_credentials()
            .ok_or(OutputError::MissingCredentials)?;

        let video_info = self
            .host
            .video_info()
            .ok_or(OutputError::VideoInfoUnavailable)?;

        if video_info.width.max(video_info.height) > MAX_FRAME_DIMENSION {
            warn!(
                "negotiated mode {}x{} exceeds the service ceiling of {} px",
                video_info.width, video_info.height, MAX_FRAME_DIMENSION
            );
        }
        *self.mode.lock() = Some((video_info.width, video_info.height));

        let video_frame_interval_ns = if video_info.fps_num == 0 {
            warn!("host reported no frame rate; using the nominal video interval");
            FALLBACK_VIDEO_FRAME_INTERVAL_NS
        } else {
            debug!(
                "video frame rate: {} / {}",
                video_info.fps_num, video_info.fps_den
            );
            (1_000_000_000.0 / f64::from(video_info.fps_num) * f64::from(video_info.fps_den)) as i64
        };

        self.relay.reset();

        let params = SessionParams {
            username: credentials.username,
            password: credentials.password,
            channel: CHANNEL_NAME.to_string(),
            video_frame_interval_ns,
            audio_frame_interval_ns: AUDIO_FRAME_INTERVAL_NS,
        };

        let session = self.transport.create_session(&params).map_err(|source| {
            let detail = self.transport.last_error();
            error!("session creation failed: {detail}");
            OutputError::SessionRejected { detail, source }
        })?;

        info!(
            peer_token = %session.peer_token,
            channel_id = %session.channel_id,
            "cast session established"
        );

        encoder::apply_service_constraints(self.host.video_encoder().as_ref());

        if !self.host.can_begin_data_capture() {
            error!("host rejected data capture");
            return Err(OutputError::CaptureRejected);
        }
        if !self.host.initialize_encoders() {
            return Err(OutputError::EncoderInitFailed);
        }
        if !self.host.begin_data_capture() {
            return Err(OutputError::CaptureRejected);
        }

        Ok(())
    }

    /// Begin asynchronous shutdown and return immediately.
    ///
    /// The spawned thread ends host data capture and closes the transport
    /// session; the next [`start`](Self::start) or drop joins it.
    pub fn stop(&self) {
        debug!("stop requested");

        let mut stop_task = self.stop_task.lock();
        if let Some(handle) = stop_task.take() {
            if !handle.is_finished() {
                warn!("shutdown already in progress");
                *stop_task = Some(handle);
                return;
            }
            if handle.join().is_err() {
                warn!("previous shutdown thread panicked");
            }
        }

        {
            let mut state = self.state.lock();
            if matches!(
                *state,
                LifecycleState::Starting | LifecycleState::Capturing
            ) {
                *state = LifecycleState::Stopping;
            }
        }

        let host = Arc::clone(&self.host);
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name("cast-output-stop".to_string())
            .spawn(move || run_shutdown(host.as_ref(), transport.as_ref(), &state));

        match spawned {
            Ok(handle) => *stop_task = Some(handle),
            Err(e) => {
                warn!("failed to spawn shutdown thread ({e}); shutting down inline");
                run_shutdown(self.host.as_ref(), self.transport.as_ref(), &self.state);
            }
        }
    }

    /// Forward one encoded packet to the transport.
    ///
    /// Invoked from the host's encoder threads; video and audio may arrive
    /// on different threads.
    pub fn handle_packet(&self, packet: &EncoderPacket<'_>) {
        match packet.kind {
            PacketKind::Video => {
                let encoder = self.host.video_encoder();
                self.relay
                    .handle_video(self.transport.as_ref(), encoder.as_ref(), packet);
            }
            PacketKind::Audio => self.relay.handle_audio(self.transport.as_ref(), packet),
        }
    }

    /// Block until any in-flight shutdown thread has finished.
    fn join_pending_stop(&self) {
        let handle = self.stop_task.lock().take();
        if let Some(handle) = handle {
            debug!("waiting for previous shutdown to finish");
            if handle.join().is_err() {
                warn!("shutdown thread panicked");
            }
        }
    }
}

/// Shutdown handshake shared by the background thread and the inline
/// fallback. End host capture first so no packets race the close.
fn run_shutdown<H: OutputHost>(
    host: &H,
    transport: &dyn Transport,
    state: &Mutex<LifecycleState>,
) {
    host.end_data_capture();
    transport.close();

    let mut state = state.lock();
    if *state == LifecycleState::Stopping {
        *state = LifecycleState::Idle;
    }
    debug!("cast session shut down");
}

impl<H: OutputHost> Drop for CastOutput<H> {
    fn drop(&mut self) {
        debug!("destroying cast output");
        self.join_pending_stop();
    }
}

impl<H: OutputHost> OutputCallbacks for CastOutput<H> {
    fn name(&self) -> &'static str {
        OUTPUT_NAME
    }

    fn on_start(&self) -> bool {
        match self.start() {
            Ok(()) => true,
            Err(e) => {
                error!("failed to start cast output: {e}");
                false
            }
        }
    }

    fn on_stop(&self) {
        self.stop();
    }

    fn on_packet(&self, packet: &EncoderPacket<'_>) {
        self.handle_packet(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fatality_classification() {
        assert!(OutputError::MissingCredentials.is_fatal());
        assert!(OutputError::VideoInfoUnavailable.is_fatal());
        assert!(OutputError::SessionRejected {
            detail: "auth".to_string(),
            source: TransportError::SessionRejected { status: 1 },
        }
        .is_fatal());

        assert!(!OutputError::CaptureRejected.is_fatal());
        assert!(!OutputError::EncoderInitFailed.is_fatal());
        assert!(!OutputError::AlreadyActive.is_fatal());
    }

    #[test]
    fn test_error_display_includes_transport_detail() {
        let err = OutputError::SessionRejected {
            detail: "invalid service key".to_string(),
            source: TransportError::SessionRejected { status: 401 },
        };
        assert!(err.to_string().contains("invalid service key"));
    }
}
