//! Rate classes and rate resolution.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::def::NodeDef;
use crate::error::{GraphError, Result};
use crate::graph::ParseOptions;
use crate::settings::Rates;

/// How often a node is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rate {
    /// One sample per audio frame, produced a control block at a time.
    Audio,
    /// Once per control block.
    Control,
    /// Once per display frame.
    Frame,
    /// A fixed value.
    Constant,
    /// Pulled on request.
    Demand,
}

impl Rate {
    /// Canonical name, as written in definitions.
    pub fn name(self) -> &'static str {
        match self {
            Rate::Audio => "audio",
            Rate::Control => "control",
            Rate::Frame => "frame",
            Rate::Constant => "constant",
            Rate::Demand => "demand",
        }
    }

    /// Look up a canonical rate name.
    pub fn from_name(name: &str) -> Option<Rate> {
        match name {
            "audio" => Some(Rate::Audio),
            "control" => Some(Rate::Control),
            "frame" => Some(Rate::Frame),
            "constant" => Some(Rate::Constant),
            "demand" => Some(Rate::Demand),
            _ => None,
        }
    }

    /// Look up a two-letter rate mnemonic (`ar`, `kr`, `dr`, `cr`).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Rate> {
        match mnemonic {
            "ar" => Some(Rate::Audio),
            "kr" => Some(Rate::Control),
            "dr" => Some(Rate::Demand),
            "cr" => Some(Rate::Constant),
            _ => None,
        }
    }

    /// Parse a canonical name, failing with [`GraphError::UnknownRate`].
    pub fn parse(name: &str) -> Result<Rate> {
        Rate::from_name(name).ok_or_else(|| GraphError::UnknownRate { rate: name.to_owned() })
    }

    /// Output buffer length for a node at this rate.
    ///
    /// Audio-rate nodes produce one control block of samples per evaluation;
    /// every other class holds a single current value.
    pub fn buffer_len(self, rates: &Rates) -> usize {
        match self {
            Rate::Audio => rates.control,
            _ => 1,
        }
    }

    /// Sample rate of a node evaluated at this rate.
    pub fn sample_rate(self, rates: &Rates) -> f64 {
        match self {
            Rate::Audio => rates.audio,
            Rate::Control => rates.audio / rates.control as f64,
            Rate::Frame => rates.frame,
            Rate::Constant | Rate::Demand => 1.0,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a definition's rate in place.
///
/// With `override_rate` set, the rate is forced to `options.rate`. Otherwise
/// mnemonics are rewritten to canonical names and anything else is left
/// untouched; a missing rate stays missing and defaults to audio at
/// instantiation.
pub fn expand_rate(def: &mut NodeDef, options: &ParseOptions) {
    if options.override_rate {
        def.rate = options.rate.map(|rate| rate.name().to_owned());
        return;
    }

    if let Some(rate) = def.rate.as_deref().and_then(Rate::from_mnemonic) {
        def.rate = Some(rate.name().to_owned());
    }
}
