//! RelayBlueprint - Config Loader 输出
//!
//! 描述完整的中继配置：监听地址、分发策略、目的地路由表。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::DEFAULT_DESTINATION;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的中继配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// HTTP 监听设置
    pub server: ServerConfig,

    /// 分发策略
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// 目的地名称 -> 投递 URL
    pub destinations: BTreeMap<String, String>,
}

/// HTTP 监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    pub port: u16,

    /// 单个请求体上限 (字节)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl ServerConfig {
    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 分发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// 周期性 flush 间隔 (秒)，必须 > 0
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// 单次投递超时 (秒)，缺省或 0 表示不限制
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,

    /// 关闭时等待在途投递的时间 (秒)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// 非 2xx 响应是否视为投递失败
    #[serde(default)]
    pub fail_on_error_status: bool,

    /// 未配置目的地的处理策略
    #[serde(default)]
    pub unknown_destination: UnknownDestinationPolicy,

    /// `fallback` 策略使用的目的地
    #[serde(default = "default_fallback_destination")]
    pub fallback_destination: String,
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_fallback_destination() -> String {
    DEFAULT_DESTINATION.to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            attempt_timeout_secs: None,
            shutdown_grace_secs: default_shutdown_grace_secs(),
            fail_on_error_status: false,
            unknown_destination: UnknownDestinationPolicy::default(),
            fallback_destination: default_fallback_destination(),
        }
    }
}

impl DispatchConfig {
    /// Periodic flush interval
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Per-attempt timeout, `None` when unbounded
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Grace period for in-flight attempts on shutdown
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// 未配置目的地策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownDestinationPolicy {
    /// 拒绝整个入站批次，不入队任何事件
    #[default]
    RejectBatch,
    /// 记录日志并丢弃该事件
    Drop,
    /// 改投到 fallback 目的地
    Fallback,
}
