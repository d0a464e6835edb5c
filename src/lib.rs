// src/lib.rs
//! Triggered multi-channel acquisition: ring buffers, median pre-filter,
//! edge/level trigger with pre/post windows and on-demand signal statistics.
pub mod config;
pub mod drivers;
pub mod engine;
pub mod recorder;
pub mod types;

pub use config::{AcquisitionConfig, Edge, TriggerMode};
pub use drivers::{
    render_capture_png, ManualSource, MedianFilter, PlotStyle, RingBuffer, SampleSource,
    ScopeError, SimulatedSource, SourceError, StatsEstimator, Trigger, TriggerDecision,
};
pub use engine::AcquisitionEngine;
pub use recorder::CaptureRecorder;
pub use types::{BufferWindow, CaptureFrame, ChannelId, RawSample, Stats};
