// 使用库 crate
use chat_memory::config::{Profile, Settings};
use chat_memory::embedding::OllamaEmbedding;
use chat_memory::{initialize, proxy, QdrantMemoryFactory};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// 记忆客户端配置自检
#[derive(Parser)]
#[command(version)]
struct Args {
    /// 配置 Profile: local 或 hybrid
    #[arg(long, env = "MEMORY_PROFILE", default_value = "local")]
    profile: Profile,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // 必须在创建任何客户端之前执行
    proxy::bypass_local_proxy();

    println!("🔧 测试记忆客户端配置 (profile: {})...", args.profile);

    let settings = match Settings::from_env(args.profile) {
        Ok(settings) => settings,
        Err(e) => {
            println!("❌ 测试失败: {}", e);
            return Ok(());
        }
    };

    println!("📍 Ollama 地址: {}", settings.ollama_base_url);
    println!("🤖 聊天模型: {}", settings.chat_model);
    println!("🧠 记忆提取模型: {}", settings.llm_model);
    println!("📊 嵌入模型: {}", settings.embedding_model);
    println!("📏 嵌入维度: {}", settings.embedding_dims);
    println!("💾 数据路径: {}", settings.data_path);
    if let Some(cloud) = &settings.cloud {
        println!(
            "☁️  云端聊天: {} @ {} (API key: {})",
            cloud.model,
            cloud.base_url,
            if cloud.has_api_key() { "已配置" } else { "未配置" }
        );
    }

    let embedder = OllamaEmbedding::new(
        &settings.ollama_base_url,
        &settings.embedding_model,
        settings.embedding_dims,
    );
    if !embedder.health_check().await? {
        println!("⚠️  Ollama 服务无响应: {}", settings.ollama_base_url);
    }

    println!("\n尝试初始化记忆客户端...");

    match initialize(&QdrantMemoryFactory::default(), &settings).await {
        Ok(memory) => {
            println!("✅ 初始化成功！数据存储在: {}", memory.data_path());
            if let Ok(stats) = memory.stats().await {
                println!(
                    "📦 集合 '{}' 中已有 {} 条记忆",
                    stats.collection_name, stats.total_points
                );
            }
            println!("✅ 测试成功！记忆客户端已准备就绪。");
        }
        Err(e) => println!("❌ 测试失败: {}", e),
    }

    Ok(())
}
