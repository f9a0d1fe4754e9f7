//! Buffer descriptors and buffer references.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{kind_of, GraphError, Result};

/// Per-channel sample data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferData {
    pub channels: Vec<Vec<f32>>,
}

/// Resolved multi-channel sample data plus identifying metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferDesc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Sample rate of the data in Hz, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    pub data: BufferData,
}

impl BufferDesc {
    /// A descriptor holding `channels`.
    pub fn new(channels: Vec<Vec<f32>>) -> Self {
        Self {
            data: BufferData { channels },
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.data.channels
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.data.channels.len()
    }

    /// Length of the longest channel.
    pub fn num_frames(&self) -> usize {
        self.data.channels.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Duration in seconds, if the sample rate is known.
    pub fn duration(&self) -> Option<f64> {
        self.sample_rate
            .filter(|rate| *rate > 0.0)
            .map(|rate| self.num_frames() as f64 / rate)
    }
}

/// A normalized buffer reference, as found in a node's `buffer` input.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferDef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    /// Alias of `src`; takes precedence when both are given.
    #[serde(default)]
    pub url: Option<String>,
    /// Force a new fetch even if `src` is unchanged.
    #[serde(default)]
    pub replace: bool,
    /// Inline channel data.
    #[serde(default)]
    pub data: Option<BufferData>,
    #[serde(default)]
    pub sample_rate: Option<f64>,
}

impl BufferDef {
    /// A reference to a buffer by id only.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// A reference to fetch `src`, cached under `id`.
    pub fn fetch(id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            src: Some(src.into()),
            ..Self::default()
        }
    }

    /// Request a refetch (builder pattern).
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Where to fetch from.
    pub fn source(&self) -> Option<&str> {
        self.url.as_deref().or(self.src.as_deref())
    }

    /// True if the reference carries its own sample data.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.data.is_some()
    }

    /// Turn inline data into a descriptor. `None` if there is no inline data.
    pub fn to_inline_desc(&self) -> Option<BufferDesc> {
        let data = self.data.clone()?;
        Some(BufferDesc {
            id: self.id.clone(),
            src: self.source().map(str::to_owned),
            sample_rate: self.sample_rate,
            data,
        })
    }
}

/// Normalize a buffer reference.
///
/// - an array of arrays is inline multi-channel data
/// - a plain array of numbers is inline single-channel data
/// - a string is an id
/// - an object is a [`BufferDef`]
pub fn expand_buffer_def(def: Value) -> Result<BufferDef> {
    match def {
        Value::Array(items) => {
            let multi_channel = items.first().map_or(true, Value::is_array);
            let channels = if multi_channel {
                serde_json::from_value::<Vec<Vec<f32>>>(Value::Array(items))
            } else {
                serde_json::from_value::<Vec<f32>>(Value::Array(items)).map(|samples| vec![samples])
            }
            .map_err(|e| GraphError::InvalidBufferDef { reason: e.to_string() })?;

            Ok(BufferDef {
                data: Some(BufferData { channels }),
                ..BufferDef::default()
            })
        }
        Value::String(id) => Ok(BufferDef::by_id(id)),
        obj @ Value::Object(_) => serde_json::from_value(obj)
            .map_err(|e| GraphError::InvalidBufferDef { reason: e.to_string() }),
        other => Err(GraphError::InvalidBufferDef {
            reason: format!("expected an id, sample array or object, found {}", kind_of(&other)),
        }),
    }
}
