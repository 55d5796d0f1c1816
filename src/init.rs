use tracing::info;

use crate::config::{MemoryConfig, Profile, Settings};
use crate::error::MemoryError;
use crate::memory::{Memory, MemoryFactory, QdrantMemoryFactory};
use crate::proxy;

/// 用给定工厂初始化记忆客户端
///
/// 失败时原样返回错误，不做重试，由调用方决定如何处理。
pub async fn initialize<F: MemoryFactory>(
    factory: &F,
    settings: &Settings,
) -> Result<F::Client, MemoryError> {
    let config = MemoryConfig::from_settings(settings);
    let client = factory.create(&config).await?;

    info!(
        profile = %settings.profile,
        path = config.vector_store.path(),
        "memory initialized"
    );

    Ok(client)
}

/// 从进程环境初始化默认的记忆客户端
pub async fn init_memory(profile: Profile) -> Result<Memory, MemoryError> {
    proxy::bypass_local_proxy();
    let settings = Settings::from_env(profile)?;
    initialize(&QdrantMemoryFactory::default(), &settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use std::sync::Mutex;

    /// 记录收到的配置，不连接任何服务
    #[derive(Default)]
    struct RecordingFactory {
        calls: Mutex<Vec<MemoryConfig>>,
    }

    impl MemoryFactory for RecordingFactory {
        type Client = MemoryConfig;

        async fn create(&self, config: &MemoryConfig) -> Result<MemoryConfig, MemoryError> {
            self.calls.lock().unwrap().push(config.clone());
            Ok(config.clone())
        }
    }

    struct FailingFactory;

    impl MemoryFactory for FailingFactory {
        type Client = ();

        async fn create(&self, _config: &MemoryConfig) -> Result<(), MemoryError> {
            Err(MemoryError::Ollama {
                status: 503,
                body: "service unavailable".to_string(),
            })
        }
    }

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        Settings::from_lookup(Profile::Local, |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
    }

    async fn init_from(
        factory: &RecordingFactory,
        pairs: &[(&str, &str)],
    ) -> Result<MemoryConfig, MemoryError> {
        let settings = settings(pairs)?;
        initialize(factory, &settings).await
    }

    #[tokio::test]
    async fn test_initialize_passes_config() {
        let factory = RecordingFactory::default();
        let settings = settings(&[("DATA_PATH", "/tmp/mem")]).unwrap();

        let client = initialize(&factory, &settings).await.unwrap();

        assert_eq!(client.vector_store.path(), "/tmp/mem");
        assert_eq!(factory.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_twice_same_path() {
        let factory = RecordingFactory::default();
        let settings = settings(&[("DATA_PATH", "/tmp/mem")]).unwrap();

        let first = initialize(&factory, &settings).await.unwrap();
        let second = initialize(&factory, &settings).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(factory.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_dims_fails_before_factory() {
        let factory = RecordingFactory::default();

        let result = init_from(&factory, &[("EMBEDDING_DIMS", "seven hundred")]).await;

        assert!(matches!(
            result,
            Err(MemoryError::Config(ConfigError::InvalidNumber { .. }))
        ));
        assert!(factory.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_factory_error_propagates() {
        let settings = settings(&[]).unwrap();

        let err = initialize(&FailingFactory, &settings).await.unwrap_err();

        assert!(matches!(err, MemoryError::Ollama { status: 503, .. }));
    }
}
