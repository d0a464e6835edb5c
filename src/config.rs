// src/config.rs
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::drivers::ScopeError;
use crate::types::{ChannelId, MAX_CHANNELS};

/// Edge direction for the Schmitt-style trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerMode {
    /// Capture a window as soon as the pre-roll is filled.
    #[default]
    Free,
    /// Edge trigger whose threshold follows the smoothed signal level.
    Auto { edge: Edge },
    /// Edge trigger at the configured level.
    Fixed { edge: Edge },
}

impl TriggerMode {
    pub const AUTO_RISE: Self = TriggerMode::Auto { edge: Edge::Rising };
    pub const AUTO_FALL: Self = TriggerMode::Auto { edge: Edge::Falling };
    pub const FIXED_RISE: Self = TriggerMode::Fixed { edge: Edge::Rising };
    pub const FIXED_FALL: Self = TriggerMode::Fixed { edge: Edge::Falling };

    pub fn edge(&self) -> Option<Edge> {
        match *self {
            TriggerMode::Free => None,
            TriggerMode::Auto { edge } | TriggerMode::Fixed { edge } => Some(edge),
        }
    }

    /// Whether the threshold is replaced by the running auto-level.
    pub fn follows_auto_level(&self) -> bool {
        matches!(self, TriggerMode::Auto { .. })
    }
}

/// Per-run acquisition settings. Immutable once handed to `start`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Hardware channels to capture, in buffer order. Index 0 feeds the trigger.
    pub channels: Vec<ChannelId>,
    pub trigger_mode: TriggerMode,
    /// Fixed threshold, or the seed for the auto-level.
    pub trigger_level: u16,
    pub sampling_rate_hz: u32,
    /// Exponential smoothing coefficient for the auto-level (clamped to 0.0..=1.0).
    pub auto_speed: f32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            trigger_mode: TriggerMode::Free,
            trigger_level: 2048,
            sampling_rate_hz: 20_000,
            auto_speed: 0.002,
        }
    }
}

impl AcquisitionConfig {
    pub fn new<C: Into<ChannelId>>(channels: impl IntoIterator<Item = C>) -> Self {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_trigger(mut self, mode: TriggerMode, level: u16) -> Self {
        self.trigger_mode = mode;
        self.trigger_level = level;
        self
    }

    pub fn with_sampling_rate(mut self, sampling_rate_hz: u32) -> Self {
        self.sampling_rate_hz = sampling_rate_hz;
        self
    }

    pub fn with_auto_speed(mut self, auto_speed: f32) -> Self {
        self.auto_speed = auto_speed;
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Position of a hardware channel inside the configured list.
    pub fn channel_index(&self, channel: ChannelId) -> Option<usize> {
        self.channels.iter().position(|c| *c == channel)
    }

    pub fn validate(&self) -> Result<(), ScopeError> {
        let count = self.channel_count();
        if count == 0 || count > MAX_CHANNELS {
            return Err(ScopeError::InvalidChannelCount(count));
        }
        if self.sampling_rate_hz == 0 {
            return Err(ScopeError::InvalidSampleRate);
        }
        if !self.auto_speed.is_finite() {
            return Err(ScopeError::InvalidAutoSpeed(self.auto_speed));
        }
        Ok(())
    }

    /// Keep one raw sample out of this many. Always at least 1.
    pub fn decimation_factor(&self, hardware_rate_hz: u32) -> u32 {
        let requested = self.sampling_rate_hz.max(1);
        if requested < hardware_rate_hz {
            hardware_rate_hz.div_ceil(requested)
        } else {
            1
        }
    }

    /// Rate to program into the sample source so that decimating by
    /// `decimation_factor` lands on the requested rate.
    pub fn conversion_rate_hz(&self, hardware_rate_hz: u32) -> u32 {
        let factor = self.decimation_factor(hardware_rate_hz);
        if factor > 1 {
            factor.saturating_mul(self.sampling_rate_hz)
        } else {
            self.sampling_rate_hz
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ScopeError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScopeError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HARDWARE_RATE_HZ;

    #[test]
    fn rejects_bad_channel_counts() {
        let empty = AcquisitionConfig::default();
        assert!(matches!(
            empty.validate(),
            Err(ScopeError::InvalidChannelCount(0))
        ));
        let too_many = AcquisitionConfig::new(0..9u8);
        assert!(matches!(
            too_many.validate(),
            Err(ScopeError::InvalidChannelCount(9))
        ));
        assert!(AcquisitionConfig::new(0..8u8).validate().is_ok());
    }

    #[test]
    fn decimation_factor_rounds_up() {
        let cfg = AcquisitionConfig::new([0u8]).with_sampling_rate(HARDWARE_RATE_HZ / 4);
        assert_eq!(cfg.decimation_factor(HARDWARE_RATE_HZ), 4);
        assert_eq!(cfg.conversion_rate_hz(HARDWARE_RATE_HZ), HARDWARE_RATE_HZ);

        let cfg = AcquisitionConfig::new([0u8]).with_sampling_rate(3_000);
        assert_eq!(cfg.decimation_factor(HARDWARE_RATE_HZ), 7);
        assert_eq!(cfg.conversion_rate_hz(HARDWARE_RATE_HZ), 21_000);

        let cfg = AcquisitionConfig::new([0u8]).with_sampling_rate(40_000);
        assert_eq!(cfg.decimation_factor(HARDWARE_RATE_HZ), 1);
        assert_eq!(cfg.conversion_rate_hz(HARDWARE_RATE_HZ), 40_000);
    }

    #[test]
    fn parses_json_with_defaults() {
        let cfg = AcquisitionConfig::from_json(
            r#"{"channels": [3, 4], "trigger_mode": {"kind": "auto", "edge": "falling"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.channels, vec![ChannelId(3), ChannelId(4)]);
        assert_eq!(cfg.trigger_mode, TriggerMode::AUTO_FALL);
        assert_eq!(cfg.trigger_level, 2048);
        assert_eq!(cfg.sampling_rate_hz, 20_000);
        assert_eq!(cfg.channel_index(ChannelId(4)), Some(1));
        assert_eq!(cfg.channel_index(ChannelId(9)), None);
    }

    #[test]
    fn json_without_channels_is_rejected() {
        assert!(matches!(
            AcquisitionConfig::from_json(r#"{"trigger_level": 100}"#),
            Err(ScopeError::InvalidChannelCount(0))
        ));
        assert!(matches!(
            AcquisitionConfig::from_json("not json"),
            Err(ScopeError::Config(_))
        ));
    }
}
