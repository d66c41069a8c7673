use thiserror::Error;

use crate::audio::SampleId;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("empty audio file: {0}")]
    Empty(String),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sample {0} is not available")]
    Missing(SampleId),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("audio decode failed: {0}")]
    Codec(#[from] symphonia::core::errors::Error),
    #[error("no playable audio track")]
    NoTrack,
    #[error("unsupported sample layout: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("tune not found: {0}")]
    TuneNotFound(String),
    #[error("variant '{variant}' not found in tune '{tune}'")]
    VariantNotFound { tune: String, variant: String },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("variant '{variant}' not found in tune '{tune}'")]
    VariantNotFound { tune: String, variant: String },
    #[error("render duration must be positive, got {0}s")]
    InvalidDuration(f64),
    #[error("WAV encode failed: {0}")]
    Encode(#[from] hound::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tune '{0}' has no variants")]
    Empty(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("audio thread is gone")]
    Disconnected,
    #[error("audio device error: {0}")]
    Device(String),
}
