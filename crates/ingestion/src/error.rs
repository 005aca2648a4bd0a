//! Ingestion 错误类型

use dispatcher::DispatcherError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 请求体不是 JSON 对象数组
    #[error("malformed request body: {message}")]
    MalformedBody {
        /// 错误消息
        message: String,
    },

    /// 事件指向未配置的目的地（reject_batch 策略）
    #[error("event #{index} names unknown destination '{destination}'")]
    UnknownDestination {
        /// 事件在批次中的位置
        index: usize,
        /// 目的地名称
        destination: String,
    },

    /// 分发引擎错误
    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),
}

impl IngestionError {
    /// 创建请求体格式错误
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBody {
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
