//! Render configuration — fixed constants of the effects graph, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest impulse response a config may ask for.
pub const MAX_IMPULSE_SECONDS: f64 = 10.0;

/// Constants that shape every render. The defaults reproduce the studio's
/// behavior: a 2 s impulse response with decay exponent 2, a 0.3 delay send
/// and no feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Impulse response length in seconds.
    pub impulse_seconds: f64,
    /// Exponent of the impulse response's decay envelope.
    pub impulse_decay: f64,
    /// Rising instead of falling impulse envelope.
    pub impulse_reverse: bool,
    /// Scale the impulse response to a calibrated power, as a host
    /// convolver does.
    pub normalize_impulse: bool,
    /// Gain on the delayed signal.
    pub delay_wet_gain: f64,
    /// Delay feedback (0 = single tap).
    pub delay_feedback: f64,
    /// Seed for the impulse response noise. `None` draws fresh entropy on
    /// every render.
    pub seed: Option<u64>,
    /// Longest output accepted by the graph builder.
    pub max_output_seconds: f64,
    /// Session render timeout. `None` waits indefinitely.
    pub render_timeout_ms: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            impulse_seconds: 2.0,
            impulse_decay: 2.0,
            impulse_reverse: false,
            normalize_impulse: true,
            delay_wet_gain: 0.3,
            delay_feedback: 0.0,
            seed: None,
            max_output_seconds: 600.0,
            render_timeout_ms: None,
        }
    }
}

impl RenderConfig {
    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Same config with a fixed impulse-response seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("impulseSeconds", self.impulse_seconds)?;
        in_range("impulseSeconds", self.impulse_seconds, 0.0, MAX_IMPULSE_SECONDS)?;
        positive("impulseDecay", self.impulse_decay)?;
        positive("maxOutputSeconds", self.max_output_seconds)?;
        in_range("delayWetGain", self.delay_wet_gain, 0.0, 1.0)?;
        in_range("delayFeedback", self.delay_feedback, 0.0, 0.99)?;
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn in_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
