use thiserror::Error;

/// Failures acquiring or driving the audio output.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default output device available")]
    NoOutputDevice,

    #[error("failed to query output config: {0}")]
    Config(String),

    #[error("unsupported sample format {0}; f32 output is required")]
    UnsupportedFormat(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(String),

    #[error("failed to start output stream: {0}")]
    Play(String),

    #[error("failed to suspend output stream: {0}")]
    Pause(String),

    #[error("output is already open")]
    AlreadyOpen,
}

/// Errors visible to the engine's caller.
///
/// Only initialization can fail; note and volume operations degrade to
/// logged no-ops instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio device unavailable: {0}")]
    Device(#[from] DeviceError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
