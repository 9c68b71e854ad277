use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("channel error: {0}")]
    Channel(String),

    #[error("no {0} device available")]
    NoDevice(&'static str),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("unsupported sample format: {0}")]
    SampleFormat(String),

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("frame source error: {0}")]
    Source(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
