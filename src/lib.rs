// 导出模块供测试和外部使用
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod init;
pub mod llm;
pub mod memory;
pub mod proxy;

pub use config::{MemoryConfig, Profile, Settings};
pub use error::MemoryError;
pub use init::{init_memory, initialize};
pub use memory::{Memory, MemoryFactory, QdrantMemoryFactory};
