//! 配置模块：从环境变量读取设置，组装记忆客户端的嵌套配置
//!
//! 配置由三部分组成：向量存储、LLM（用于提取记忆）、嵌入器。
//! 两种 Profile 共用同一个构建函数，只是取值不同。
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::proxy;

/// Ollama 服务地址
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// 本地模式的聊天模型
pub const DEFAULT_LOCAL_CHAT_MODEL: &str = "gemma3:27b";

/// 混合模式的云端聊天模型
pub const DEFAULT_CLOUD_CHAT_MODEL: &str = "deepseek/deepseek-chat";

/// 混合模式的云端聊天服务地址
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// 混合模式下用于提取记忆的轻量本地模型
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemma2:2b";

/// Ollama Embedding 模型名称
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Embedding 向量维度（nomic-embed-text 为 768）
pub const DEFAULT_EMBEDDING_DIMS: usize = 768;

/// 本地数据存储路径
pub const DEFAULT_DATA_PATH: &str = "./mem0_data";

/// 集合名称（类似数据库的表名）
pub const COLLECTION_NAME: &str = "chat_memory";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({source})")]
    InvalidNumber {
        var: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("unknown profile `{0}` (expected `local` or `hybrid`)")]
    UnknownProfile(String),
}

/// 配置 Profile：全本地 或 本地 + 云端混合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// 聊天与记忆提取都走本地 Ollama
    #[default]
    Local,
    /// 聊天走云端 API，记忆提取和嵌入仍走本地 Ollama
    Hybrid,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Local => "local",
            Profile::Hybrid => "hybrid",
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Profile::Local),
            "hybrid" => Ok(Profile::Hybrid),
            _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 云端聊天服务设置（仅混合模式）
///
/// 只记录设置，不会进入记忆客户端配置，也不会在这里发起请求。
#[derive(Debug)]
pub struct CloudChatSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
}

impl CloudChatSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

/// 从环境变量解析出的原始设置
#[derive(Debug)]
pub struct Settings {
    pub profile: Profile,
    pub ollama_base_url: String,
    /// 对话使用的模型
    pub chat_model: String,
    /// 记忆库内部用于提取事实的模型
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_dims: usize,
    pub data_path: String,
    pub qdrant_url: Option<String>,
    pub cloud: Option<CloudChatSettings>,
}

impl Settings {
    /// 从任意键值来源读取设置
    ///
    /// # 参数
    /// - `profile`: 使用的 Profile
    /// - `lookup`: 按变量名取值，未设置时返回 `None`
    ///
    /// # 返回
    /// `EMBEDDING_DIMS` 不是合法整数时返回 `ConfigError::InvalidNumber`
    pub fn from_lookup<F>(profile: Profile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let embedding_dims = match lookup("EMBEDDING_DIMS") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(dims) => dims,
                Err(source) => {
                    return Err(ConfigError::InvalidNumber {
                        var: "EMBEDDING_DIMS",
                        value,
                        source,
                    })
                }
            },
            None => DEFAULT_EMBEDDING_DIMS,
        };

        let (chat_model, llm_model, cloud) = match profile {
            Profile::Local => {
                let chat_model = var("CHAT_MODEL", DEFAULT_LOCAL_CHAT_MODEL);
                (chat_model.clone(), chat_model, None)
            }
            Profile::Hybrid => {
                let chat_model = var("CHAT_MODEL", DEFAULT_CLOUD_CHAT_MODEL);
                let cloud = CloudChatSettings {
                    base_url: var("CLOUD_BASE_URL", DEFAULT_CLOUD_BASE_URL),
                    model: chat_model.clone(),
                    api_key: SecretString::from(var("CLOUD_API_KEY", "")),
                };
                (
                    chat_model,
                    var("EXTRACTION_MODEL", DEFAULT_EXTRACTION_MODEL),
                    Some(cloud),
                )
            }
        };

        Ok(Self {
            profile,
            ollama_base_url: var("OLLAMA_BASE_URL", DEFAULT_OLLAMA_URL),
            chat_model,
            llm_model,
            embedding_model: var("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dims,
            data_path: var("DATA_PATH", DEFAULT_DATA_PATH),
            qdrant_url: lookup("QDRANT_URL"),
            cloud,
        })
    }

    /// 从进程环境读取设置（会先加载 `.env`，但不覆盖已有变量）
    pub fn from_env(profile: Profile) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(profile, |name| std::env::var(name).ok())
    }
}

/// 记忆客户端的完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub vector_store: VectorStoreConfig,
    pub llm: LlmConfig,
    pub embedder: EmbedderConfig,
}

/// 向量存储配置，序列化为 `{"provider": ..., "config": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "config", rename_all = "lowercase")]
pub enum VectorStoreConfig {
    Qdrant(QdrantConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// 本地存储路径
    pub path: String,
    pub collection_name: String,
    /// 必须与嵌入器的维度一致
    pub embedding_model_dims: usize,
    /// 数据持久化到磁盘
    pub on_disk: bool,
    /// Qdrant 服务地址，未设置时由工厂使用默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "config", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama(OllamaLlmConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaLlmConfig {
    pub model: String,
    pub ollama_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "config", rename_all = "lowercase")]
pub enum EmbedderConfig {
    Ollama(OllamaEmbedderConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaEmbedderConfig {
    pub model: String,
    pub ollama_base_url: String,
    pub embedding_dims: usize,
}

impl VectorStoreConfig {
    pub fn path(&self) -> &str {
        match self {
            VectorStoreConfig::Qdrant(config) => &config.path,
        }
    }

    pub fn embedding_dims(&self) -> usize {
        match self {
            VectorStoreConfig::Qdrant(config) => config.embedding_model_dims,
        }
    }
}

impl EmbedderConfig {
    pub fn embedding_dims(&self) -> usize {
        match self {
            EmbedderConfig::Ollama(config) => config.embedding_dims,
        }
    }
}

impl MemoryConfig {
    /// 由设置组装配置（纯函数，不做任何 I/O）
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            vector_store: VectorStoreConfig::Qdrant(QdrantConfig {
                path: settings.data_path.clone(),
                collection_name: COLLECTION_NAME.to_string(),
                embedding_model_dims: settings.embedding_dims,
                on_disk: true,
                url: settings.qdrant_url.clone(),
            }),
            llm: LlmConfig::Ollama(OllamaLlmConfig {
                model: settings.llm_model.clone(),
                ollama_base_url: settings.ollama_base_url.clone(),
            }),
            embedder: EmbedderConfig::Ollama(OllamaEmbedderConfig {
                model: settings.embedding_model.clone(),
                ollama_base_url: settings.ollama_base_url.clone(),
                embedding_dims: settings.embedding_dims,
            }),
        }
    }

    /// 绕过本地代理后，从进程环境构建配置
    pub fn from_env(profile: Profile) -> Result<Self, ConfigError> {
        proxy::bypass_local_proxy();
        let settings = Settings::from_env(profile)?;
        Ok(Self::from_settings(&settings))
    }
}
