//! GatewayBlueprint - Config Loader 输出
//!
//! 描述完整的网关配置：批处理窗口、输出路由、接入端点。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的网关配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 批处理窗口设置
    pub window: WindowSettings,

    /// 输出路由配置 (按注册顺序)
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    /// 接入端点设置
    #[serde(default)]
    pub server: ServerConfig,
}

/// Batching window settings
///
/// `max_batch_size` and `interval_ms` have no defaults. They are signed so that a
/// negative value reaches validation instead of failing as a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// 触发 flush 的记录数
    pub max_batch_size: i64,

    /// 窗口最长时长 (毫秒)
    pub interval_ms: i64,

    /// Hard cap on records held by the open batch (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffered_records: Option<u64>,

    /// What `append` does once the hard cap is reached
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Restart the interval clock after every flush
    #[serde(default)]
    pub reset_timer_on_flush: bool,

    /// What happens to the open batch when the engine stops
    #[serde(default)]
    pub shutdown: ShutdownPolicy,
}

/// Policy applied by a fire-and-forget append when the open batch is at its hard cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming record
    #[default]
    DropNewest,
    /// Evict the oldest record of the open batch
    DropOldest,
}

/// Policy for the open, not-yet-triggered batch on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Dispatch the open batch one last time if it holds records
    #[default]
    FlushPending,
    /// Drop the open batch
    Discard,
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出 (每行一条记录)
    File,
    /// 网络输出 (UDP)
    Network,
}

/// Ingestion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults_from_toml() {
        let window: WindowSettings = toml::from_str(
            r#"
max_batch_size = 10
interval_ms = 5000
"#,
        )
        .unwrap();

        assert_eq!(window.max_batch_size, 10);
        assert_eq!(window.interval_ms, 5000);
        assert_eq!(window.max_buffered_records, None);
        assert_eq!(window.overflow_policy, OverflowPolicy::DropNewest);
        assert!(!window.reset_timer_on_flush);
        assert_eq!(window.shutdown, ShutdownPolicy::FlushPending);
    }

    #[test]
    fn test_window_requires_size_and_interval() {
        let result: Result<WindowSettings, _> = toml::from_str("max_batch_size = 10");
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_interval_survives_parse() {
        let window: WindowSettings =
            serde_json::from_str(r#"{ "max_batch_size": 1, "interval_ms": -5 }"#).unwrap();
        assert_eq!(window.interval_ms, -5);
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_addr, "0.0.0.0:8000");
        assert_eq!(server.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_policies_snake_case() {
        let json = serde_json::to_string(&OverflowPolicy::DropOldest).unwrap();
        assert_eq!(json, "\"drop_oldest\"");
        let policy: ShutdownPolicy = serde_json::from_str("\"discard\"").unwrap();
        assert_eq!(policy, ShutdownPolicy::Discard);
    }
}
