//! Audio settings shared by every node of an environment.

use serde::{Deserialize, Serialize};

/// Evaluation rates of the environment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rates {
    /// Audio sample rate in Hz.
    pub audio: f64,
    /// Control block length: audio samples produced per control-rate step.
    pub control: usize,
    /// Frame (display) rate in Hz.
    pub frame: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            audio: 44_100.0,
            control: 64,
            frame: 60.0,
        }
    }
}

/// Environment-wide audio configuration.
///
/// Deserializes from camelCase JSON; missing fields take their defaults.
///
/// ```
/// # use synthgraph::AudioSettings;
/// let settings = AudioSettings::from_json(r#"{ "rates": { "audio": 48000 }, "chans": 1 }"#).unwrap();
/// assert_eq!(settings.rates.audio, 48_000.0);
/// assert_eq!(settings.rates.control, 64);
/// assert_eq!(settings.chans, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioSettings {
    pub rates: Rates,
    /// Output channel count.
    pub chans: usize,
    /// Number of shared buses.
    pub num_buses: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            rates: Rates::default(),
            chans: 2,
            num_buses: 8,
        }
    }
}

impl AudioSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Set the audio sample rate (builder pattern).
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.rates.audio = rate;
        self
    }

    /// Set the control block length (builder pattern).
    pub fn with_block_size(mut self, samples: usize) -> Self {
        self.rates.control = samples;
        self
    }

    /// Set the output channel count (builder pattern).
    pub fn with_chans(mut self, chans: usize) -> Self {
        self.chans = chans;
        self
    }
}
