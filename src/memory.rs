use tracing::debug;
use uuid::Uuid;

use crate::config::{EmbedderConfig, LlmConfig, MemoryConfig, VectorStoreConfig};
use crate::db::{parse_point_id, CollectionStats, MemoryItem, MemoryPoint, VectorDB};
use crate::embedding::OllamaEmbedding;
use crate::error::MemoryError;
use crate::llm::OllamaLlm;

/// Qdrant 服务地址（配置中未指定 url 时使用）
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// 由配置创建记忆客户端
#[allow(async_fn_in_trait)]
pub trait MemoryFactory {
    type Client;

    async fn create(&self, config: &MemoryConfig) -> Result<Self::Client, MemoryError>;
}

/// 默认工厂：Qdrant 存储 + Ollama 嵌入与提取
pub struct QdrantMemoryFactory {
    default_url: String,
}

impl QdrantMemoryFactory {
    pub fn new(default_url: &str) -> Self {
        Self {
            default_url: default_url.to_string(),
        }
    }
}

impl Default for QdrantMemoryFactory {
    fn default() -> Self {
        Self::new(DEFAULT_QDRANT_URL)
    }
}

impl MemoryFactory for QdrantMemoryFactory {
    type Client = Memory;

    async fn create(&self, config: &MemoryConfig) -> Result<Memory, MemoryError> {
        Memory::from_config(config, &self.default_url).await
    }
}

/// 记忆客户端 - 整合 提取 + embedding + 向量库
pub struct Memory {
    db: VectorDB,
    embedder: OllamaEmbedding,
    llm: OllamaLlm,
    data_path: String,
}

impl Memory {
    /// 按配置连接各个服务，并确保集合存在
    ///
    /// 集合已存在时直接复用，所以同一路径重复初始化不会报错。
    pub async fn from_config(config: &MemoryConfig, default_url: &str) -> Result<Self, MemoryError> {
        let VectorStoreConfig::Qdrant(store) = &config.vector_store;
        let LlmConfig::Ollama(llm) = &config.llm;
        let EmbedderConfig::Ollama(embedder) = &config.embedder;

        let url = store.url.as_deref().unwrap_or(default_url);
        debug!(url, collection = %store.collection_name, "connecting to Qdrant");

        let db = VectorDB::new(
            url,
            &store.collection_name,
            store.embedding_model_dims,
            store.on_disk,
        )?;
        db.init_collection().await?;

        Ok(Self {
            db,
            embedder: OllamaEmbedding::from_config(embedder),
            llm: OllamaLlm::from_config(llm),
            data_path: store.path.clone(),
        })
    }

    pub fn data_path(&self) -> &str {
        &self.data_path
    }

    /// 添加记忆：先让 LLM 提取事实，再逐条写入
    ///
    /// 没有提取到事实时返回空列表
    pub async fn add(&self, text: &str, user_id: &str) -> Result<Vec<MemoryItem>, MemoryError> {
        let facts = self.llm.extract_facts(text).await?;
        debug!(count = facts.len(), model = self.llm.model(), "extracted facts");
        self.store(facts, user_id).await
    }

    /// 原样写入，不经过 LLM 提取
    pub async fn add_raw(&self, text: &str, user_id: &str) -> Result<Vec<MemoryItem>, MemoryError> {
        self.store(vec![text.to_string()], user_id).await
    }

    /// 语义搜索该用户的记忆
    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        let query_vector = self.embedder.encode(query).await?;
        self.db.search(query_vector, limit, Some(user_id)).await
    }

    /// 按 id 获取记忆（UUID 或数字 id），id 不合法或不存在时返回 `None`
    pub async fn get(&self, id: &str) -> Result<Option<MemoryItem>, MemoryError> {
        match parse_point_id(id) {
            Some(point_id) => self.db.get(point_id).await,
            None => Ok(None),
        }
    }

    pub async fn stats(&self) -> Result<CollectionStats, MemoryError> {
        self.db.get_stats().await
    }

    async fn store(&self, facts: Vec<String>, user_id: &str) -> Result<Vec<MemoryItem>, MemoryError> {
        if facts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = facts.iter().map(String::as_str).collect();
        let embeddings = self.embedder.encode_batch(&texts).await?;

        let points: Vec<MemoryPoint> = facts
            .into_iter()
            .zip(embeddings)
            .map(|(memory, embedding)| MemoryPoint {
                id: Uuid::new_v4().to_string(),
                memory,
                user_id: user_id.to_string(),
                embedding,
            })
            .collect();

        let items: Vec<(String, String)> = points
            .iter()
            .map(|p| (p.id.clone(), p.memory.clone()))
            .collect();

        let created_at = self.db.upsert_batch(points).await?;

        Ok(items
            .into_iter()
            .map(|(id, memory)| MemoryItem {
                id,
                memory,
                user_id: user_id.to_string(),
                created_at,
                score: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profile, Settings};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Ollama 指向 mock 服务；Qdrant 客户端只创建不连接
    fn offline_memory(ollama_url: &str) -> Memory {
        Memory {
            db: VectorDB::new("http://127.0.0.1:6334", "chat_memory", 3, true).unwrap(),
            embedder: OllamaEmbedding::new(ollama_url, "nomic-embed-text", 3),
            llm: OllamaLlm::new(ollama_url, "gemma2:2b"),
            data_path: "/tmp/mem".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_without_facts_stores_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "{\"facts\": []}"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2, 0.3]})),
            )
            .expect(0)
            .mount(&server)
            .await;

        let memory = offline_memory(&server.uri());
        let added = memory.add("今天天气不错", "alice").await.unwrap();

        assert!(added.is_empty());
    }

    #[tokio::test]
    async fn test_get_invalid_id() {
        let server = MockServer::start().await;
        let memory = offline_memory(&server.uri());

        assert!(memory.get("not-a-uuid").await.unwrap().is_none());
        assert!(memory.get("").await.unwrap().is_none());
        assert_eq!(memory.data_path(), "/tmp/mem");
    }

    // 集成测试需要 Ollama 和 Qdrant 服务运行
    #[tokio::test]
    #[ignore] // 默认忽略，需要手动运行
    async fn test_add_and_search() {
        let settings = Settings::from_env(Profile::Local).unwrap();
        let config = MemoryConfig::from_settings(&settings);
        let memory = QdrantMemoryFactory::default().create(&config).await.unwrap();

        let added = memory
            .add_raw("我最喜欢的饮料是乌龙茶", "test_user")
            .await
            .unwrap();
        assert_eq!(added.len(), 1);

        let results = memory.search("喜欢喝什么", "test_user", 5).await.unwrap();
        assert!(!results.is_empty(), "应该找到相关记忆");
        assert!(results.iter().all(|r| r.user_id == "test_user"));

        let fetched = memory.get(&added[0].id).await.unwrap();
        assert_eq!(fetched.map(|m| m.memory), Some("我最喜欢的饮料是乌龙茶".to_string()));
    }

    #[tokio::test]
    #[ignore]
    async fn test_reinitialize_same_path() {
        let settings = Settings::from_env(Profile::Local).unwrap();
        let config = MemoryConfig::from_settings(&settings);
        let factory = QdrantMemoryFactory::default();

        let first = factory.create(&config).await.unwrap();
        let second = factory.create(&config).await.unwrap();

        assert_eq!(first.data_path(), second.data_path());
    }

    #[tokio::test]
    #[ignore]
    async fn test_get_unknown_id() {
        let settings = Settings::from_env(Profile::Local).unwrap();
        let config = MemoryConfig::from_settings(&settings);
        let memory = QdrantMemoryFactory::default().create(&config).await.unwrap();

        assert!(memory.get("not-a-uuid").await.unwrap().is_none());
        assert!(memory
            .get(&Uuid::new_v4().to_string())
            .await
            .unwrap()
            .is_none());
    }
}
