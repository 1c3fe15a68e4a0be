//! Option type definitions and service constants

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Channel identifier presented to the casting service.
pub const CHANNEL_NAME: &str = "obs-studio";

/// Service-imposed ceiling on the video bitrate, in kbps.
pub const MAX_VIDEO_BITRATE_KBPS: u32 = 7000;

/// Service-imposed ceiling on either frame dimension, in pixels.
/// Bookkeeping only: larger modes are logged, not rejected.
pub const MAX_FRAME_DIMENSION: u32 = 1920;

/// Nominal interval between audio frames, in nanoseconds (20 ms).
pub const AUDIO_FRAME_INTERVAL_NS: i64 = 20_000_000;

/// Nominal interval between video frames when the host reports no frame
/// rate, in nanoseconds (one frame at ~30 fps).
pub const FALLBACK_VIDEO_FRAME_INTERVAL_NS: i64 = 33_333_333;

/// Options the output declares to the host's settings store.
///
/// Apart from `transport_library`, these are consumed by the host's socket
/// and congestion machinery rather than by the adapter itself; the adapter
/// only declares them and their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Congestion threshold before frames are dropped, in milliseconds.
    #[serde(default = "default_drop_threshold_ms")]
    pub drop_threshold_ms: u32,

    /// Congestion threshold before P-frames are dropped, in milliseconds.
    #[serde(default = "default_pframe_drop_threshold_ms")]
    pub pframe_drop_threshold_ms: u32,

    /// Maximum time to wait for a clean shutdown, in seconds.
    #[serde(default = "default_max_shutdown_time_sec")]
    pub max_shutdown_time_sec: u32,

    /// Local address to bind outgoing connections to: `"default"` or a
    /// literal address of a local interface (the host enumerates them).
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    /// Use the host's newer socket loop implementation.
    #[serde(default)]
    pub new_socket_loop: bool,

    /// Enable low-latency socket tuning.
    #[serde(default)]
    pub low_latency: bool,

    /// Name of the transport shared library to load (platform prefix and
    /// extension are appended automatically).
    #[serde(default = "default_transport_library")]
    pub transport_library: String,
}

fn default_drop_threshold_ms() -> u32 {
    700
}

fn default_pframe_drop_threshold_ms() -> u32 {
    900
}

fn default_max_shutdown_time_sec() -> u32 {
    30
}

fn default_bind_ip() -> String {
    "default".to_string()
}

fn default_transport_library() -> String {
    "castbridge".to_string()
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            drop_threshold_ms: default_drop_threshold_ms(),
            pframe_drop_threshold_ms: default_pframe_drop_threshold_ms(),
            max_shutdown_time_sec: default_max_shutdown_time_sec(),
            bind_ip: default_bind_ip(),
            new_socket_loop: false,
            low_latency: false,
            transport_library: default_transport_library(),
        }
    }
}

impl OutputOptions {
    /// The configured bind address, or `None` for the default route.
    pub fn bind_address(&self) -> Option<IpAddr> {
        if self.bind_ip == "default" {
            return None;
        }
        self.bind_ip.parse().ok()
    }
}
