//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责生成流程调度和批量处理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `generation_pipeline` - 生成流水线
//! - 一次 `generate()` 调用的完整状态机
//! - 主提供方重试（携带失败反馈）
//! - 备用提供方按优先级依次尝试
//! - 记录每一步的执行日志
//!
//! ### `batch_processor` - 批量生成处理器
//! - 加载任务列表（Vec<GenerationJob>）
//! - 控制并发数量（Semaphore）
//! - 写入结果文件和失败日志
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<GenerationJob>)
//!     ↓
//! generation_pipeline (处理单个生成请求)
//!     ↓
//! workflow::ResponseProcessor (处理单条消息)
//!     ↓
//! services (能力层：validate / repair / prompt / output)
//!     ↓
//! infrastructure (基础设施：ProviderAdapter)
//! ```

pub mod batch_processor;
pub mod generation_pipeline;

pub use batch_processor::{BatchProcessor, BatchStats, JobReport, JobStatus};
pub use generation_pipeline::{GenerationArgs, GenerationOutcome, GenerationPipeline};
