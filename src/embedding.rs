use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OllamaEmbedderConfig;
use crate::error::MemoryError;

/// Ollama Embedding 客户端
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dims: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// 创建新的 Ollama 客户端
    ///
    /// # 参数
    /// - `base_url`: Ollama 服务地址，默认 "http://localhost:11434"
    /// - `model`: 模型名称，推荐 "nomic-embed-text"
    /// - `dims`: 期望的向量维度，必须与向量存储一致
    pub fn new(base_url: &str, model: &str, dims: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims,
        }
    }

    pub fn from_config(config: &OllamaEmbedderConfig) -> Self {
        Self::new(&config.ollama_base_url, &config.model, config.embedding_dims)
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// 将文本转换为向量
    ///
    /// 返回的维度与配置不一致时报 `DimensionMismatch`
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let url = format!("{}/api/embeddings", self.base_url);
        debug!(model = %self.model, chars = text.len(), "requesting embedding");

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(MemoryError::Ollama {
                status: status.as_u16(),
                body,
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await?;

        if embedding_response.embedding.len() != self.dims {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dims,
                actual: embedding_response.embedding.len(),
            });
        }

        Ok(embedding_response.embedding)
    }

    /// 批量编码
    pub async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let embedding = self.encode(text).await?;
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    /// 检查 Ollama 服务是否可用
    pub async fn health_check(&self) -> Result<bool, MemoryError> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
