use thiserror::Error;

/// Faults reported by a sample source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("timed out waiting for conversion results")]
    Timeout,
    #[error("sample source fault: {0}")]
    Fault(String),
    #[error("sample source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("channel count must be between 1 and 8, got {0}")]
    InvalidChannelCount(usize),
    #[error("sampling rate must be greater than zero")]
    InvalidSampleRate,
    #[error("auto level speed must be a finite number, got {0}")]
    InvalidAutoSpeed(f32),
    #[error("acquisition already running")]
    AlreadyRunning,
    #[error("acquisition has not been configured; call start first")]
    NotConfigured,
    #[error("channel index {index} out of range for {channel_count} configured channels")]
    InvalidChannel { index: usize, channel_count: usize },
    #[error("failed to acquire resource: {0}")]
    Resource(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl From<serde_json::Error> for ScopeError {
    fn from(value: serde_json::Error) -> Self {
        ScopeError::Config(value.to_string())
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}
