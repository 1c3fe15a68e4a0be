//! Output option management
//!
//! Handles loading, validation, and defaults for the options the output
//! declares to the host. The host persists these in its own settings store;
//! the TOML path exists for standalone deployments and tests.

use anyhow::{Context, Result};

pub mod types;

pub use types::{
    OutputOptions, AUDIO_FRAME_INTERVAL_NS, CHANNEL_NAME, FALLBACK_VIDEO_FRAME_INTERVAL_NS,
    MAX_FRAME_DIMENSION, MAX_VIDEO_BITRATE_KBPS,
};

impl OutputOptions {
    /// Load options from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read options file: {}", path))?;

        let options: OutputOptions =
            toml::from_str(&content).context("Failed to parse options file")?;

        options.validate()?;
        Ok(options)
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<()> {
        if self.bind_ip != "default" && self.bind_address().is_none() {
            anyhow::bail!("Invalid bind IP: {}", self.bind_ip);
        }

        if !(200..=10_000).contains(&self.drop_threshold_ms) {
            anyhow::bail!(
                "Drop threshold {} ms out of range (200-10000)",
                self.drop_threshold_ms
            );
        }

        if self.pframe_drop_threshold_ms < self.drop_threshold_ms {
            anyhow::bail!(
                "P-frame drop threshold ({} ms) cannot be below the drop threshold ({} ms)",
                self.pframe_drop_threshold_ms,
                self.drop_threshold_ms
            );
        }

        if self.transport_library.is_empty() {
            anyhow::bail!("Transport library name cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = OutputOptions::default();
        assert_eq!(options.drop_threshold_ms, 700);
        assert_eq!(options.pframe_drop_threshold_ms, 900);
        assert_eq!(options.max_shutdown_time_sec, 30);
        assert_eq!(options.bind_ip, "default");
        assert!(!options.new_socket_loop);
        assert!(!options.low_latency);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_bind_address_default_is_none() {
        let options = OutputOptions::default();
        assert!(options.bind_address().is_none());
    }

    #[test]
    fn test_bind_address_literal() {
        let mut options = OutputOptions::default();
        options.bind_ip = "192.168.0.10".to_string();
        assert_eq!(
            options.bind_address(),
            Some("192.168.0.10".parse().unwrap())
        );
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_bind_ip() {
        let mut options = OutputOptions::default();
        options.bind_ip = "not-an-address".to_string();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_threshold() {
        let mut options = OutputOptions::default();
        options.drop_threshold_ms = 50;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_thresholds() {
        let mut options = OutputOptions::default();
        options.drop_threshold_ms = 1000;
        options.pframe_drop_threshold_ms = 900;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_options_parse_with_partial_toml() {
        let options: OutputOptions = toml::from_str("low_latency = true\n").unwrap();
        assert!(options.low_latency);
        assert_eq!(options.drop_threshold_ms, 700);
        assert_eq!(options.transport_library, "castbridge");
    }
}
