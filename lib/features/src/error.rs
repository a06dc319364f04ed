use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Embedder '{model}' failed: {message}")]
    Embedder { model: String, message: String },

    #[error("Embedder '{model}' returned {actual} values, expected {expected}")]
    EmbeddingDimension {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] ati_core::Error),
}

impl From<bincode::Error> for FeatureError {
    fn from(e: bincode::Error) -> Self {
        FeatureError::Cache(e.to_string())
    }
}
