use crate::config::ConfigError;

/// 记忆客户端错误
///
/// 全部直接传给调用方，这里不做重试。
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama API error ({status}): {body}")]
    Ollama { status: u16, body: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("system clock error: {0}")]
    Time(#[from] std::time::SystemTimeError),
}

impl From<qdrant_client::QdrantError> for MemoryError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Self::Qdrant(Box::new(err))
    }
}
