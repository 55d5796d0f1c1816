//! 代理绕过
//!
//! 全局代理软件会拦截发往本地 Ollama / Qdrant 的请求导致报错，
//! 所以在创建任何 HTTP 客户端之前，把 localhost 加入不走代理的列表。
use tracing::debug;

/// 不走代理的地址列表
pub const NO_PROXY_HOSTS: &str = "localhost,127.0.0.1";

/// 设置 `NO_PROXY` 和 `no_proxy`（某些系统只认小写）
///
/// 必须在创建客户端之前调用；重复调用结果不变。
pub fn bypass_local_proxy() {
    for key in ["NO_PROXY", "no_proxy"] {
        std::env::set_var(key, NO_PROXY_HOSTS);
    }
    debug!(hosts = NO_PROXY_HOSTS, "proxy bypass configured");
}
