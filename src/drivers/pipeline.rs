use log::debug;

use crate::config::AcquisitionConfig;
use crate::drivers::error::ScopeError;
use crate::drivers::filter::MedianFilter;
use crate::drivers::stats::StatsEstimator;
use crate::drivers::trigger::{Trigger, TriggerDecision};
use crate::drivers::RingBuffer;
use crate::types::{BufferWindow, CaptureFrame, ChannelId, Stats, BUFFER_SIZE, TRIGGER_POSITION};

/// Configured index of the channel that drives the trigger.
pub const TRIGGER_CHANNEL: usize = 0;

/// Keeps one raw sample out of every `factor`.
#[derive(Clone, Copy, Debug)]
struct Decimator {
    factor: u32,
    counter: u32,
}

impl Decimator {
    fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1),
            counter: 0,
        }
    }

    fn keep(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.factor {
            self.counter = 0;
            true
        } else {
            false
        }
    }
}

/// Per-sample capture state: decimation, filtering, triggering and storage.
///
/// Not synchronised by itself; the engine keeps it behind its data lock.
pub struct SamplePipeline {
    config: Option<AcquisitionConfig>,
    buffers: Vec<RingBuffer>,
    filters: Vec<MedianFilter>,
    decimators: Vec<Decimator>,
    trigger: Trigger,
    estimator: StatsEstimator,
    decimation_factor: u32,
    ready: bool,
    samples_stored: u64,
}

impl Default for SamplePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplePipeline {
    pub fn new() -> Self {
        Self {
            config: None,
            buffers: Vec::new(),
            filters: Vec::new(),
            decimators: Vec::new(),
            trigger: Trigger::new(BUFFER_SIZE, TRIGGER_POSITION),
            estimator: StatsEstimator::new(0.0),
            decimation_factor: 1,
            ready: false,
            samples_stored: 0,
        }
    }

    /// Reset everything for a fresh run. `config` must already be validated.
    pub fn configure(
        &mut self,
        config: AcquisitionConfig,
        decimation_factor: u32,
        effective_rate_hz: f32,
    ) {
        let channels = config.channel_count();
        self.buffers.resize_with(channels, RingBuffer::new);
        self.buffers.iter_mut().for_each(|ring| ring.clear());
        self.filters.resize_with(channels, MedianFilter::new);
        self.filters.iter_mut().for_each(|filter| filter.reset());
        self.decimators = vec![Decimator::new(decimation_factor); channels];
        self.decimation_factor = decimation_factor.max(1);
        self.estimator = StatsEstimator::new(effective_rate_hz);
        self.trigger
            .start(config.trigger_mode, config.trigger_level, config.auto_speed);
        self.ready = false;
        self.samples_stored = 0;
        debug!(
            "pipeline configured: {channels} channel(s), decimation x{}, {effective_rate_hz:.1} Hz",
            self.decimation_factor
        );
        self.config = Some(config);
    }

    /// Re-arm for the next window. Buffer contents stay until overwritten.
    pub fn rearm(&mut self) -> Result<(), ScopeError> {
        if self.config.is_none() {
            return Err(ScopeError::NotConfigured);
        }
        self.trigger.reset();
        self.ready = false;
        Ok(())
    }

    /// Feed one raw sample for configured channel `index`.
    ///
    /// Returns the trigger decision when the sample was kept and belongs to
    /// the trigger channel. Kept samples are always stored, fired or not.
    pub fn on_sample(&mut self, index: usize, raw: u16) -> Option<TriggerDecision> {
        let decimator = self.decimators.get_mut(index)?;
        if !decimator.keep() {
            return None;
        }
        let filtered = self.filters[index].push(raw);
        let decision = if index == TRIGGER_CHANNEL {
            let decision = self.trigger.evaluate(filtered);
            if decision.buffer_ready() {
                self.ready = true;
            }
            Some(decision)
        } else {
            None
        };
        self.buffers[index].write(filtered);
        self.samples_stored += 1;
        decision
    }

    pub fn config(&self) -> Option<&AcquisitionConfig> {
        self.config.as_ref()
    }

    pub fn channel_index(&self, channel: ChannelId) -> Option<usize> {
        self.config.as_ref()?.channel_index(channel)
    }

    fn buffer(&self, index: usize) -> Result<&RingBuffer, ScopeError> {
        self.buffers.get(index).ok_or(ScopeError::InvalidChannel {
            index,
            channel_count: self.buffers.len(),
        })
    }

    pub fn stats(&self, index: usize) -> Result<Stats, ScopeError> {
        Ok(self.estimator.compute(self.buffer(index)?))
    }

    pub fn window(&self, index: usize, count: usize) -> Result<BufferWindow, ScopeError> {
        Ok(self.buffer(index)?.read_window(count))
    }

    /// Every channel's full window, taken in one pass.
    pub fn frame(&self) -> Result<CaptureFrame, ScopeError> {
        let config = self.config.as_ref().ok_or(ScopeError::NotConfigured)?;
        Ok(CaptureFrame {
            sample_rate_hz: self.estimator.sample_rate_hz(),
            channels: config.channels.clone(),
            samples: self
                .buffers
                .iter()
                .map(|ring| ring.iter().collect())
                .collect(),
            trigger_position: self.trigger.trigger_position(),
            threshold: self.trigger.threshold(),
            ready: self.ready,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn decimation_factor(&self) -> u32 {
        self.decimation_factor
    }

    pub fn effective_rate_hz(&self) -> f32 {
        self.estimator.sample_rate_hz()
    }

    /// Samples written to any ring buffer since the last `configure`.
    pub fn samples_stored(&self) -> u64 {
        self.samples_stored
    }
}
