//! # Dispatcher
//!
//! 检测帧保存模块。
//!
//! 负责：
//! - 接收触发检测的 `SaveRequest`
//! - 在独立 worker 中写入 sink
//! - 慢 sink 只丢帧，不阻塞采集循环

pub mod error;
pub mod factory;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{FrameSink, SaveRequest};
pub use error::DispatcherError;
pub use factory::create_sink;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink};
