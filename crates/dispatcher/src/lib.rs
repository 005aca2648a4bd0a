//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 按目的地维护待发送队列（每个目的地最多一个在途批次）
//! - 定时触发 flush，失败批次回到队首重试
//! - 单任务持有全部队列状态，无需加锁

pub mod delivery;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod queue;
pub mod transports;
pub mod trigger;

pub use contracts::{DeliveryTransport, Event};
pub use delivery::{AttemptOptions, DeliveryAttempt, DeliveryOutcome};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherConfig};
pub use engine::{DispatchEngine, RoutedEvent};
pub use error::DispatcherError;
pub use handle::DispatcherHandle;
pub use metrics::{QueueCounters, QueueStatus};
pub use queue::{DestinationQueue, FlushedBatch};
pub use transports::HttpTransport;
pub use trigger::{FlushTrigger, IntervalTrigger, LocalFlushTrigger};
