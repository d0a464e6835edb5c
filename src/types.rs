// src/types.rs
use serde::{Deserialize, Serialize};

/// Upper bound on configured channels per run.
pub const MAX_CHANNELS: usize = 8;
/// Samples kept per channel.
pub const BUFFER_SIZE: usize = 128;
/// Samples reserved ahead of the trigger point inside a capture window.
pub const TRIGGER_POSITION: usize = 64;
/// Median pre-filter width.
pub const MEDIAN_WINDOW: usize = 3;
/// Fixed conversion rate of the sampling hardware.
pub const HARDWARE_RATE_HZ: u32 = 20_000;

/// Hardware channel identifier as reported by the sample source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl From<u8> for ChannelId {
    fn from(value: u8) -> Self {
        ChannelId(value)
    }
}

/// One conversion result from the sample source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawSample {
    pub channel: ChannelId,
    pub value: u16,
}

impl RawSample {
    pub fn new(channel: impl Into<ChannelId>, value: u16) -> Self {
        Self {
            channel: channel.into(),
            value,
        }
    }
}

/// Measurements re-derived from a channel's ring buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub min: u16,
    pub max: u16,
    pub average: f32,
    pub frequency_hz: f32,
    /// Number of samples that took part (non-zero slots).
    pub valid_samples: usize,
}

/// Ordered copy of a channel's ring buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferWindow {
    /// Oldest to newest.
    pub samples: Vec<u16>,
    /// Write cursor the copy started from.
    pub position: usize,
}

/// All configured channels' windows, read under a single lock.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureFrame {
    /// Rate at which the stored samples were taken (after decimation).
    pub sample_rate_hz: f32,
    pub channels: Vec<ChannelId>,
    /// channel -> samples, oldest first
    pub samples: Vec<Vec<u16>>,
    pub trigger_position: usize,
    pub threshold: u16,
    /// Whether the window was complete when the frame was taken.
    pub ready: bool,
}
