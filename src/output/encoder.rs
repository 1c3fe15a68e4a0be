//! One-shot video encoder override
//!
//! Applied at session start, before capture begins. The casting service
//! ingests a constrained H.264 stream: capped constant bitrate, a keyframe
//! every second, and zero-latency settings with no B-frames. The override
//! replaces the encoder's settings bundle wholesale; the host encoder is
//! assumed to accept it.

use tracing::{debug, info};

use crate::config::MAX_VIDEO_BITRATE_KBPS;
use crate::host::{EncoderHandle, EncoderSettings, RateControl};

/// Clamp the encoder bitrate to the service ceiling and push the fixed
/// low-latency settings bundle.
pub(crate) fn apply_service_constraints(encoder: &dyn EncoderHandle) {
    let current = encoder.settings();
    let bitrate_kbps = current.bitrate_kbps.min(MAX_VIDEO_BITRATE_KBPS);
    if bitrate_kbps < current.bitrate_kbps {
        info!(
            "clamping video bitrate {} kbps to service ceiling {} kbps",
            current.bitrate_kbps, MAX_VIDEO_BITRATE_KBPS
        );
    }

    // buffer_size is still written even with use_buffer_size off, for
    // hosts that ignore the disable flag
    encoder.update(EncoderSettings {
        bitrate_kbps,
        use_buffer_size: false,
        buffer_size_kbits: bitrate_kbps * 2,
        keyint_sec: 1,
        rate_control: RateControl::Cbr,
        preset: "veryfast".to_string(),
        profile: "high".to_string(),
        tune: "zerolatency".to_string(),
        encoder_options: String::new(),
        b_frames: 0,
    });

    debug!("applied service encoder constraints at {bitrate_kbps} kbps");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockEncoderHandle;

    fn override_result(configured_bitrate: u32) -> EncoderSettings {
        let mut encoder = MockEncoderHandle::new();
        encoder.expect_settings().returning(move || EncoderSettings {
            bitrate_kbps: configured_bitrate,
            ..EncoderSettings::default()
        });

        let pushed = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let sink = std::sync::Arc::clone(&pushed);
        encoder.expect_update().returning(move |settings| {
            *sink.lock() = Some(settings);
        });

        apply_service_constraints(&encoder);
        let result = pushed.lock().take().expect("override pushed no settings");
        result
    }

    #[test]
    fn test_bitrate_above_ceiling_is_clamped() {
        let settings = override_result(9000);
        assert_eq!(settings.bitrate_kbps, 7000);
        assert_eq!(settings.buffer_size_kbits, 14_000);
    }

    #[test]
    fn test_bitrate_below_ceiling_passes_through() {
        let settings = override_result(3000);
        assert_eq!(settings.bitrate_kbps, 3000);
        assert_eq!(settings.buffer_size_kbits, 6000);
    }

    #[test]
    fn test_fixed_bundle() {
        let settings = override_result(4000);
        assert_eq!(settings.rate_control, RateControl::Cbr);
        assert_eq!(settings.keyint_sec, 1);
        assert!(!settings.use_buffer_size);
        assert_eq!(settings.preset, "veryfast");
        assert_eq!(settings.profile, "high");
        assert_eq!(settings.tune, "zerolatency");
        assert_eq!(settings.b_frames, 0);
        assert!(settings.encoder_options.is_empty());
    }
}
