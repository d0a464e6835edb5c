use std::collections::VecDeque;
use std::f32::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::SourceError;
use crate::types::{ChannelId, RawSample};

/// Continuous-conversion sample producer feeding the acquisition worker.
pub trait SampleSource: Send + 'static {
    /// Program the channel pattern and conversion rate. Returns the rate the
    /// source will actually run at.
    fn configure(&mut self, channels: &[ChannelId], conversion_rate_hz: u32)
        -> Result<u32, SourceError>;

    /// Append available conversion results to `out`, waiting at most `timeout`.
    /// `Err(SourceError::Timeout)` means nothing arrived in time.
    fn read(&mut self, out: &mut Vec<RawSample>, timeout: Duration) -> Result<(), SourceError>;

    /// Called by the worker when it begins consuming after a start or restart.
    fn resume(&mut self) {}

    /// Called by the worker when acquisition pauses.
    fn pause(&mut self) {}
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<RawSample>,
    batch_size: usize,
}

impl ManualSource {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            batch_size: 64,
        }
    }

    /// A source that never produces anything.
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl SampleSource for ManualSource {
    fn configure(
        &mut self,
        _channels: &[ChannelId],
        conversion_rate_hz: u32,
    ) -> Result<u32, SourceError> {
        Ok(conversion_rate_hz)
    }

    fn read(&mut self, out: &mut Vec<RawSample>, timeout: Duration) -> Result<(), SourceError> {
        if self.queue.is_empty() {
            thread::sleep(timeout.min(Duration::from_millis(1)));
            return Err(SourceError::Timeout);
        }
        let take = self.batch_size.min(self.queue.len());
        out.extend(self.queue.drain(..take));
        Ok(())
    }
}

/// Sine generator with additive noise, paced in real time at the configured
/// conversion rate. Each configured channel gets its own phase offset.
pub struct SimulatedSource {
    frequency_hz: f32,
    offset: f32,
    amplitude: f32,
    noise: u16,
    rng: StdRng,
    channels: Vec<ChannelId>,
    rate_hz: u32,
    started: Instant,
    emitted: u64,
    max_batch: usize,
}

impl SimulatedSource {
    pub fn new(frequency_hz: f32) -> Self {
        Self {
            frequency_hz,
            offset: 2048.0,
            amplitude: 1500.0,
            noise: 20,
            rng: StdRng::seed_from_u64(0x5eed),
            channels: Vec::new(),
            rate_hz: 0,
            started: Instant::now(),
            emitted: 0,
            max_batch: 1024,
        }
    }

    pub fn with_noise(mut self, noise: u16) -> Self {
        self.noise = noise;
        self
    }

    fn sample_at(&mut self, tick: u64, channel_index: usize) -> u16 {
        let t = tick as f32 / self.rate_hz as f32;
        let phase = 2.0 * PI * self.frequency_hz * t + channel_index as f32 * PI / 4.0;
        let noise = if self.noise > 0 {
            let n = i32::from(self.noise);
            self.rng.gen_range(-n..=n) as f32
        } else {
            0.0
        };
        (self.offset + self.amplitude * phase.sin() + noise).clamp(1.0, 4095.0) as u16
    }
}

impl SampleSource for SimulatedSource {
    fn configure(
        &mut self,
        channels: &[ChannelId],
        conversion_rate_hz: u32,
    ) -> Result<u32, SourceError> {
        if channels.is_empty() {
            return Err(SourceError::Unavailable("no channels in pattern".into()));
        }
        if conversion_rate_hz == 0 {
            return Err(SourceError::Unavailable("zero conversion rate".into()));
        }
        self.channels = channels.to_vec();
        self.rate_hz = conversion_rate_hz;
        self.resume();
        Ok(conversion_rate_hz)
    }

    fn read(&mut self, out: &mut Vec<RawSample>, timeout: Duration) -> Result<(), SourceError> {
        if self.rate_hz == 0 || self.channels.is_empty() {
            return Err(SourceError::Unavailable("source not configured".into()));
        }
        let deadline = Instant::now() + timeout;
        loop {
            let due = (self.started.elapsed().as_secs_f64() * f64::from(self.rate_hz)) as u64;
            let pending = due.saturating_sub(self.emitted);
            if pending > 0 {
                let ticks = pending.min(self.max_batch as u64);
                for _ in 0..ticks {
                    let tick = self.emitted;
                    for index in 0..self.channels.len() {
                        let value = self.sample_at(tick, index);
                        out.push(RawSample {
                            channel: self.channels[index],
                            value,
                        });
                    }
                    self.emitted += 1;
                }
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SourceError::Timeout);
            }
            thread::sleep(Duration::from_micros(200));
        }
    }

    fn resume(&mut self) {
        // Restart pacing so a pause does not turn into a burst of backlog.
        self.started = Instant::now();
        self.emitted = 0;
    }
}
