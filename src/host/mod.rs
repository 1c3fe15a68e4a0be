//! Host application boundary
//!
//! The adapter runs inside a live production application that owns the
//! encoder pipeline, the configured service object, and the capture state
//! machine. Everything the adapter needs from that application is expressed
//! here as traits, so the orchestration logic stays testable without a live
//! host.
//!
//! Two directions cross this boundary:
//!
//! - **Consumed** ([`OutputHost`], [`EncoderHandle`]): encoder access and
//!   settings, service credentials, video timing info, and the
//!   capture-control calls the host exposes to outputs.
//! - **Exposed** ([`OutputCallbacks`]): the lifecycle surface the host
//!   invokes on a registered output. Creation and destruction map onto
//!   construction and `Drop` of the implementing type.

use std::sync::Arc;

use crate::config::OutputOptions;

/// Service credentials retrieved from the host's configured service object.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account or service identifier.
    pub username: String,
    /// Matching secret.
    pub password: String,
}

/// Video pipeline information reported by the host.
#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    /// Frame rate numerator. A value of zero means the host could not
    /// report a frame rate even though the pipeline exists.
    pub fps_num: u32,
    /// Frame rate denominator.
    pub fps_den: u32,
    /// Negotiated output width in pixels.
    pub width: u32,
    /// Negotiated output height in pixels.
    pub height: u32,
}

/// Rate-control mode of the host's video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateControl {
    /// Constant bitrate.
    #[default]
    Cbr,
    /// Variable bitrate.
    Vbr,
    /// Constant rate factor.
    Crf,
}

/// A settings bundle for the host's video encoder.
///
/// The host treats encoder settings as a replaceable bundle: reading yields
/// the current values, updating pushes a complete new set. The encoder is
/// assumed to accept whatever it is given; there is no failure path.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,
    /// Whether the encoder should honor `buffer_size_kbits`.
    pub use_buffer_size: bool,
    /// VBV buffer size in kbits.
    pub buffer_size_kbits: u32,
    /// Keyframe interval in seconds (0 lets the encoder choose).
    pub keyint_sec: u32,
    /// Rate-control mode.
    pub rate_control: RateControl,
    /// Speed preset name (for example `"veryfast"`).
    pub preset: String,
    /// Profile name (for example `"high"`).
    pub profile: String,
    /// Tuning name (for example `"zerolatency"`).
    pub tune: String,
    /// Raw encoder-specific option string.
    pub encoder_options: String,
    /// Number of consecutive B-frames.
    pub b_frames: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            bitrate_kbps: 2500,
            use_buffer_size: false,
            buffer_size_kbits: 2500,
            keyint_sec: 0,
            rate_control: RateControl::Cbr,
            preset: "veryfast".to_string(),
            profile: String::new(),
            tune: String::new(),
            encoder_options: String::new(),
            b_frames: 2,
        }
    }
}

/// Handle to the host's video encoder.
///
/// The handle is owned by the host; the adapter only reads settings, pushes
/// the one-time service override, and fetches the out-of-band codec
/// configuration record once encoding has begun.
#[cfg_attr(test, mockall::automock)]
pub trait EncoderHandle: Send + Sync {
    /// Read the encoder's current settings.
    fn settings(&self) -> EncoderSettings;

    /// Replace the encoder's settings with a new bundle.
    fn update(&self, settings: EncoderSettings);

    /// The encoder's out-of-band codec configuration record (for H.264,
    /// the parameter sets). `None` until the encoder has produced its
    /// first packet, and for codecs without out-of-band data.
    fn extra_data(&self) -> Option<Vec<u8>>;
}

/// The host application, as seen from a registered output.
///
/// Capture-control methods return `bool` because that is all the host
/// reports; the adapter maps declines onto typed errors.
///
/// # Thread Safety
///
/// The host invokes control calls from its management thread and packet
/// delivery from encoder threads, so implementations must be shareable
/// across threads.
pub trait OutputHost: Send + Sync + 'static {
    /// Handle to the video encoder attached to this output.
    fn video_encoder(&self) -> Arc<dyn EncoderHandle>;

    /// Credentials from the service object configured for this output, or
    /// `None` if no service is configured.
    fn service_credentials(&self) -> Option<Credentials>;

    /// Current video pipeline information, or `None` if the host cannot
    /// report any.
    fn video_info(&self) -> Option<VideoInfo>;

    /// Ask the host whether data capture can begin for this output.
    fn can_begin_data_capture(&self) -> bool;

    /// Ask the host to initialize the encoders attached to this output.
    fn initialize_encoders(&self) -> bool;

    /// Begin data capture; packets start arriving after this returns true.
    fn begin_data_capture(&self) -> bool;

    /// End data capture; no packets are delivered after this returns.
    fn end_data_capture(&self);
}

/// Media type of an encoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Encoded video.
    Video,
    /// Encoded audio.
    Audio,
}

/// An encoded media packet delivered by the host.
///
/// The buffer is borrowed from the host for the duration of the delivery
/// callback and must not be retained past it.
#[derive(Debug, Clone, Copy)]
pub struct EncoderPacket<'a> {
    /// Encoded payload.
    pub data: &'a [u8],
    /// Presentation timestamp in encoder ticks.
    pub pts: i64,
    /// Timebase numerator for converting ticks to seconds.
    pub timebase_num: u32,
    /// Timebase denominator.
    pub timebase_den: u32,
    /// Media type tag.
    pub kind: PacketKind,
    /// Whether this packet is a self-contained keyframe. Always false for
    /// audio.
    pub keyframe: bool,
}

impl<'a> EncoderPacket<'a> {
    /// Convenience constructor for a video packet.
    pub fn video(data: &'a [u8], pts: i64, timebase: (u32, u32), keyframe: bool) -> Self {
        Self {
            data,
            pts,
            timebase_num: timebase.0,
            timebase_den: timebase.1,
            kind: PacketKind::Video,
            keyframe,
        }
    }

    /// Convenience constructor for an audio packet.
    pub fn audio(data: &'a [u8], pts: i64, timebase: (u32, u32)) -> Self {
        Self {
            data,
            pts,
            timebase_num: timebase.0,
            timebase_den: timebase.1,
            kind: PacketKind::Audio,
            keyframe: false,
        }
    }
}

/// Lifecycle surface the host drives on a registered output.
///
/// `on_start` reports success as a plain boolean because that is the only
/// channel the host offers; failure detail goes to the log.
pub trait OutputCallbacks {
    /// Human-readable output name shown by the host.
    fn name(&self) -> &'static str;

    /// Start the output. Returns false if the session could not be
    /// established; the host surfaces this as a failed activation.
    fn on_start(&self) -> bool;

    /// Stop the output. Returns immediately; shutdown completes in the
    /// background.
    fn on_stop(&self);

    /// Deliver one encoded packet. Invoked from encoder threads.
    fn on_packet(&self, packet: &EncoderPacket<'_>);

    /// The options this output declares to the host's settings store.
    fn defaults() -> OutputOptions
    where
        Self: Sized,
    {
        OutputOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_settings_defaults() {
        let settings = EncoderSettings::default();
        assert_eq!(settings.bitrate_kbps, 2500);
        assert_eq!(settings.rate_control, RateControl::Cbr);
        assert!(!settings.use_buffer_size);
    }

    #[test]
    fn test_packet_constructors() {
        let payload = [0u8; 4];
        let video = EncoderPacket::video(&payload, 90, (1, 90_000), true);
        assert_eq!(video.kind, PacketKind::Video);
        assert!(video.keyframe);
        assert_eq!(video.timebase_den, 90_000);

        let audio = EncoderPacket::audio(&payload, 1024, (1, 48_000));
        assert_eq!(audio.kind, PacketKind::Audio);
        assert!(!audio.keyframe);
    }
}
