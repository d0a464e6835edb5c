// src/engine.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::AcquisitionConfig;
use crate::drivers::{SamplePipeline, SampleSource, ScopeError, SourceError};
use crate::types::{
    BufferWindow, CaptureFrame, ChannelId, RawSample, Stats, HARDWARE_RATE_HZ, MAX_CHANNELS,
};

/// Longest a single source read may block before the stop flag is re-checked.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause after a source fault before polling again.
pub const FAULT_BACKOFF: Duration = Duration::from_millis(10);
/// How long teardown waits for the worker before detaching it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct GateState {
    signalled: bool,
    closed: bool,
}

/// Binary start signal for the worker. Separate from the data lock: it only
/// decides whether the producer runs at all.
#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    wake: Condvar,
}

impl Gate {
    fn give(&self) {
        lock(&self.state).signalled = true;
        self.wake.notify_one();
    }

    /// Block until signalled. Returns false once the gate is closed.
    fn take(&self) -> bool {
        let mut state = lock(&self.state);
        while !state.signalled && !state.closed {
            state = self
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return false;
        }
        state.signalled = false;
        true
    }

    fn close(&self) {
        lock(&self.state).closed = true;
        self.wake.notify_all();
    }
}

struct Shared<S> {
    capture: Mutex<SamplePipeline>,
    source: Mutex<S>,
    gate: Gate,
    running: AtomicBool,
    stop_requested: AtomicBool,
    shutdown: AtomicBool,
}

impl<S: SampleSource> Shared<S> {
    fn deliver(&self, channel: ChannelId, value: u16) {
        let mut capture = lock(&self.capture);
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(index) = capture.channel_index(channel) else {
            return;
        };
        let Some(decision) = capture.on_sample(index, value) else {
            return;
        };
        if !decision.continue_work() {
            self.stop_requested.store(true, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            info!(
                "capture complete after {} stored samples (threshold {})",
                capture.samples_stored(),
                capture.trigger().threshold()
            );
        }
    }

    fn keep_going(&self) -> bool {
        !self.stop_requested.load(Ordering::SeqCst) && !self.shutdown.load(Ordering::SeqCst)
    }
}

fn worker_loop<S: SampleSource>(shared: Arc<Shared<S>>) {
    let mut batch: Vec<RawSample> = Vec::with_capacity(1024);
    while shared.gate.take() {
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        debug!("acquisition worker released");
        lock(&shared.source).resume();
        while shared.keep_going() {
            batch.clear();
            let result = lock(&shared.source).read(&mut batch, POLL_TIMEOUT);
            match result {
                Ok(()) => {
                    for sample in &batch {
                        if !shared.keep_going() {
                            break;
                        }
                        shared.deliver(sample.channel, sample.value);
                    }
                }
                Err(SourceError::Timeout) => continue,
                Err(err) => {
                    warn!("sample source error: {err}; retrying");
                    thread::sleep(FAULT_BACKOFF);
                }
            }
        }
        lock(&shared.source).pause();
        debug!("acquisition worker parked");
    }
    debug!("acquisition worker exiting");
}

/// Triggered acquisition engine.
///
/// Owns the per-channel ring buffers, filters and the trigger, plus one
/// worker thread that pulls conversion results from `S` and feeds them
/// through [`AcquisitionEngine::deliver`]. Every method takes `&self`, so
/// the engine can sit in an `Arc` shared by producer and consumer threads.
///
/// ```no_run
/// use sigscope::{AcquisitionConfig, AcquisitionEngine, SimulatedSource, TriggerMode};
///
/// let engine = AcquisitionEngine::new(SimulatedSource::new(1_000.0)).unwrap();
/// engine
///     .start(AcquisitionConfig::new([0u8]).with_trigger(TriggerMode::AUTO_RISE, 2048))
///     .unwrap();
/// while !engine.is_ready() {
///     std::thread::sleep(std::time::Duration::from_millis(1));
/// }
/// println!("{:?}", engine.stats(0).unwrap());
/// ```
pub struct AcquisitionEngine<S: SampleSource> {
    shared: Arc<Shared<S>>,
    worker: Option<JoinHandle<()>>,
    hardware_rate_hz: u32,
}

impl<S: SampleSource> AcquisitionEngine<S> {
    pub fn new(source: S) -> Result<Self, ScopeError> {
        Self::with_hardware_rate(source, HARDWARE_RATE_HZ)
    }

    /// Like `new`, for hardware whose native conversion rate is not the default.
    pub fn with_hardware_rate(source: S, hardware_rate_hz: u32) -> Result<Self, ScopeError> {
        if hardware_rate_hz == 0 {
            return Err(ScopeError::InvalidSampleRate);
        }
        let shared = Arc::new(Shared {
            capture: Mutex::new(SamplePipeline::new()),
            source: Mutex::new(source),
            gate: Gate::default(),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("sigscope-acq".into())
            .spawn(move || worker_loop(worker_shared))
            .map_err(|e| ScopeError::Resource(format!("acquisition worker: {e}")))?;
        Ok(Self {
            shared,
            worker: Some(worker),
            hardware_rate_hz,
        })
    }

    /// Configure a new run and release the worker.
    ///
    /// Rejected without side effects if already running or `config` is invalid.
    pub fn start(&self, config: AcquisitionConfig) -> Result<(), ScopeError> {
        let mut capture = lock(&self.shared.capture);
        if self.shared.running.load(Ordering::SeqCst) {
            warn!("start: acquisition already running");
            return Err(ScopeError::AlreadyRunning);
        }
        config.validate()?;

        let factor = config.decimation_factor(self.hardware_rate_hz);
        let requested = config.conversion_rate_hz(self.hardware_rate_hz);
        let actual = lock(&self.shared.source).configure(&config.channels, requested)?;
        if actual == 0 {
            return Err(ScopeError::Resource(
                "sample source reported a zero conversion rate".into(),
            ));
        }
        let effective_rate_hz = actual as f32 / factor as f32;
        info!(
            "starting acquisition: {} channel(s), {:?} at level {}, decimation x{factor}, {effective_rate_hz:.1} Hz",
            config.channel_count(),
            config.trigger_mode,
            config.trigger_level
        );
        capture.configure(config, factor, effective_rate_hz);

        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        drop(capture);
        self.shared.gate.give();
        Ok(())
    }

    /// Halt acquisition. Safe to call when not running.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            debug!("stop: acquisition is not running");
            return;
        }
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        info!("acquisition paused; worker waits for the next start");
    }

    /// Re-arm the trigger and resume. Ring buffers keep their contents until
    /// the next window overwrites them.
    pub fn restart(&self) -> Result<(), ScopeError> {
        let mut capture = lock(&self.shared.capture);
        capture.rearm()?;
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        let was_running = self.shared.running.swap(true, Ordering::SeqCst);
        drop(capture);
        if !was_running {
            self.shared.gate.give();
        }
        debug!("acquisition restarted");
        Ok(())
    }

    /// Per-sample entry point. Unknown channel ids and samples arriving while
    /// paused are ignored.
    pub fn deliver(&self, channel: impl Into<ChannelId>, value: u16) {
        self.shared.deliver(channel.into(), value);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.shared.capture).is_ready()
    }

    pub fn is_trigger_fired(&self) -> bool {
        lock(&self.shared.capture).trigger().is_fired()
    }

    pub fn trigger_threshold(&self) -> u16 {
        lock(&self.shared.capture).trigger().threshold()
    }

    pub fn max_channels(&self) -> usize {
        MAX_CHANNELS
    }

    pub fn decimation_factor(&self) -> u32 {
        lock(&self.shared.capture).decimation_factor()
    }

    pub fn effective_sample_rate(&self) -> f32 {
        lock(&self.shared.capture).effective_rate_hz()
    }

    pub fn samples_stored(&self) -> u64 {
        lock(&self.shared.capture).samples_stored()
    }

    pub fn config(&self) -> Option<AcquisitionConfig> {
        lock(&self.shared.capture).config().cloned()
    }

    /// Statistics for configured channel `index`, computed from the live buffer.
    pub fn stats(&self, index: usize) -> Result<Stats, ScopeError> {
        lock(&self.shared.capture).stats(index)
    }

    /// Up to `count` samples of channel `index`, oldest first.
    pub fn buffer(&self, index: usize, count: usize) -> Result<BufferWindow, ScopeError> {
        lock(&self.shared.capture).window(index, count)
    }

    /// Consistent copy of every channel's window.
    pub fn snapshot(&self) -> Result<CaptureFrame, ScopeError> {
        lock(&self.shared.capture).frame()
    }

    /// Poll `is_ready` until it turns true or `timeout` expires.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl<S: SampleSource> Drop for AcquisitionEngine<S> {
    fn drop(&mut self) {
        self.stop();
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.gate.close();
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if worker.is_finished() {
            if worker.join().is_err() {
                warn!("acquisition worker panicked");
            }
        } else {
            warn!("acquisition worker still busy after {SHUTDOWN_GRACE:?}; detaching");
        }
    }
}
