//! Error types for the terrain engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid dimensions, block sizes or LOD settings. Raised at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Brush file error: {0}")]
    BrushFile(String),

    #[error("Heightmap error: {0}")]
    Heightmap(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::BrushFile(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Heightmap(err.to_string())
    }
}
