use thiserror::Error;

/// Top-level error for a render invocation.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

impl StudioError {
    /// Message suitable for showing to the user. Decode and graph failures
    /// share one generic message; render failures say the settings could not
    /// be applied.
    pub fn user_message(&self) -> &'static str {
        match self {
            StudioError::Settings(_) => "Invalid audio settings",
            StudioError::Config(_) => "Invalid studio configuration",
            StudioError::Decode(_) | StudioError::Graph(_) => "Failed to process audio",
            StudioError::Render(_) => "Failed to apply audio settings",
        }
    }

    /// True when the render was aborted rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StudioError::Render(RenderError::Cancelled))
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{name} must be a finite number")]
    NotFinite { name: &'static str },
    #[error("Unknown setting '{0}'")]
    UnknownKey(String),
    #[error("Malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No audio data")]
    Empty,
    #[error("Unsupported audio container")]
    UnsupportedFormat,
    #[error("Invalid WAV data: {0}")]
    Wav(#[from] hound::Error),
    #[error("Invalid MP3 data: {0}")]
    Mp3(String),
    #[error("Unsupported sample format: {bits}-bit {kind}")]
    UnsupportedSampleFormat { bits: u16, kind: &'static str },
    #[error("Stream has no channels")]
    NoChannels,
    #[error("Channel {channel} has {len} frames, expected {expected}")]
    RaggedChannels {
        channel: usize,
        len: usize,
        expected: usize,
    },
    #[error("{samples} interleaved samples do not divide into {channels} channels")]
    PartialFrame { samples: usize, channels: usize },
    #[error("Sample rate must be non-zero")]
    ZeroSampleRate,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Unsupported channel count {0}")]
    UnsupportedChannels(usize),
    #[error("Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),
    #[error("Output of {frames} frames exceeds the limit of {limit}")]
    TooLong { frames: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("FFT failure: {0}")]
    Fft(String),
    #[error("Non-finite sample at channel {channel}, frame {frame}")]
    NonFinite { channel: usize, frame: usize },
    #[error("Render cancelled")]
    Cancelled,
    #[error("Render timed out after {0} ms")]
    TimedOut(u64),
    #[error("Render task failed: {0}")]
    TaskFailed(String),
    #[error("Output of {frames} frames x {channels} channels does not fit in a WAV file")]
    OutputTooLarge { frames: usize, channels: usize },
}

impl From<realfft::FftError> for RenderError {
    fn from(e: realfft::FftError) -> Self {
        RenderError::Fft(e.to_string())
    }
}
