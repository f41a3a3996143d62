//! # Layout Pipeline
//!
//! 把大模型输出的不可信文本变成结构合法的页面布局 JSON
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露"发送提示词，拿回原始文本"的能力
//! - `ProviderAdapter` - 提供方适配器接口
//! - `OpenAiCompatibleProvider` - OpenAI 兼容端点的实现
//! - `CancelSignal` - 协作式取消
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单棵树 / 单段文本
//! - `SchemaValidator` - 结构校验能力
//! - `JsonRepair` - 修复能力
//! - `LayoutPromptBuilder` - 提示词构建能力
//! - `OutputWriter` - 写结果 / 失败日志能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条消息"的完整处理流程
//! - `ResponseProcessor` - 校验 → 修复 → 再校验
//! - `VariationBuilder` - 多条候选消息组装为变体
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/generation_pipeline` - 重试与备用提供方切换
//! - `orchestrator/batch_processor` - 批量任务，管理并发
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, PipelineConfig};
pub use error::{AppError, AppResult, PipelineError, ProviderError, ProviderErrorCode};
pub use infrastructure::{CancelSignal, ProviderAdapter, RawResponse};
pub use models::{Document, Issue, Node, NodeKind, RepairEntry, Variation};
pub use orchestrator::{BatchProcessor, GenerationArgs, GenerationOutcome, GenerationPipeline};
pub use services::{JsonRepair, LayoutPromptBuilder, PromptBuilder, RepairResult, SchemaValidator};
pub use workflow::{ResponseProcessor, VariationBuilder};
