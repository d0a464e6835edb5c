// src/drivers/mod.rs
// 声明同级目录下的子模块文件
pub mod buffer;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod plot;
pub mod source;
pub mod stats;
pub mod trigger;
// 公开导出这些模块里的结构体，方便外部调用
pub use buffer::RingBuffer;
pub use error::{ScopeError, SourceError};
pub use filter::MedianFilter;
pub use pipeline::{SamplePipeline, TRIGGER_CHANNEL};
pub use plot::{render_capture_png, PlotStyle};
pub use source::{ManualSource, SampleSource, SimulatedSource};
pub use stats::StatsEstimator;
pub use trigger::{Trigger, TriggerDecision, TriggerPhase};
