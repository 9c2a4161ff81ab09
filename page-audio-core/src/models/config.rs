use serde::{Deserialize, Serialize};

/// Configuration for a capture session.
///
/// Deserializes from partial JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Graph sample rate in Hz (default: 48000).
    pub sample_rate: f64,

    /// Channels of the mixed stream (default: 2). Valid values: 1, 2.
    pub channels: u16,

    /// Render quantum length in milliseconds for the threaded clock (default: 20).
    pub render_quantum_ms: u64,

    /// Per-source buffering in seconds (default: 2).
    pub source_buffer_secs: f64,

    /// Unread audio retained by the captured stream in seconds (default: 30).
    pub stream_buffer_secs: f64,

    /// Route every newly captured source to the output device (default: false).
    pub monitor_by_default: bool,

    /// Mirror each publish into the process-wide compatibility slot (default: true).
    pub publish_global: bool,
}

/// Highest graph sample rate accepted, in Hz.
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;

/// Longest buffer duration accepted, in seconds.
pub const MAX_BUFFER_SECS: f64 = 600.0;

/// Longest render quantum accepted, in milliseconds.
pub const MAX_RENDER_QUANTUM_MS: u64 = 1000;

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err("sample rate must be positive".into());
        }
        if self.sample_rate > MAX_SAMPLE_RATE {
            return Err(format!("sample rate above {} Hz", MAX_SAMPLE_RATE));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.render_quantum_ms == 0 {
            return Err("render quantum must be at least 1ms".into());
        }
        if self.render_quantum_ms > MAX_RENDER_QUANTUM_MS {
            return Err(format!("render quantum above {}ms", MAX_RENDER_QUANTUM_MS));
        }
        for secs in [self.source_buffer_secs, self.stream_buffer_secs] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err("buffer durations must be positive".into());
            }
            if secs > MAX_BUFFER_SECS {
                return Err(format!("buffer durations above {}s", MAX_BUFFER_SECS));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("invalid configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Frames held by a buffer of `secs` seconds at the graph rate.
    pub fn frames_for_secs(&self, secs: f64) -> usize {
        (self.sample_rate * secs) as usize
    }

    /// Frames rendered per quantum by the threaded clock.
    pub fn quantum_frames(&self) -> usize {
        (self.sample_rate * self.render_quantum_ms as f64 / 1000.0) as usize
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            channels: 2,
            render_quantum_ms: 20,
            source_buffer_secs: 2.0,
            stream_buffer_secs: 30.0,
            monitor_by_default: false,
            publish_global: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CaptureConfiguration::default();
        assert!(config.validate().is_ok());
        assert!(!config.monitor_by_default);
        assert_eq!(config.quantum_frames(), 960);
    }

    #[test]
    fn rejects_surround_output() {
        let config = CaptureConfiguration {
            channels: 6,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err("unsupported channel count: 6".to_string())
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            CaptureConfiguration::from_json(r#"{"channels": 1, "monitor_by_default": true}"#)
                .unwrap();
        assert_eq!(config.channels, 1);
        assert!(config.monitor_by_default);
        assert_eq!(config.sample_rate, 48000.0);
    }

    #[test]
    fn json_is_validated() {
        let err = CaptureConfiguration::from_json(r#"{"sample_rate": 0}"#).unwrap_err();
        assert_eq!(err, "sample rate must be positive");

        let err = CaptureConfiguration::from_json(r#"{"stream_buffer_secs": 1e300}"#).unwrap_err();
        assert_eq!(err, "buffer durations above 600s");

        let err = CaptureConfiguration::from_json(r#"{"sample_rate": 1e12}"#).unwrap_err();
        assert_eq!(err, "sample rate above 384000 Hz");

        assert!(CaptureConfiguration::from_json(r#"{"render_quantum_ms": 60000}"#).is_err());
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let nan_rate = CaptureConfiguration {
            sample_rate: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan_rate.validate(), Err("sample rate must be positive".to_string()));

        let nan_buffer = CaptureConfiguration {
            source_buffer_secs: f64::NAN,
            ..Default::default()
        };
        assert_eq!(
            nan_buffer.validate(),
            Err("buffer durations must be positive".to_string())
        );

        let infinite_buffer = CaptureConfiguration {
            stream_buffer_secs: f64::INFINITY,
            ..Default::default()
        };
        assert!(infinite_buffer.validate().is_err());
    }
}
