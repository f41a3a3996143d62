//! 生成流水线的执行日志
//!
//! 每次 `generate()` 调用独占一份日志，随结果或错误一起返回给调用方。

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::ProviderErrorCode;
use crate::models::issue::Issue;

/// 流水线步骤
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PipelineStep {
    PromptBuilt {
        provider: String,
    },
    Attempt {
        provider: String,
        attempt: u32,
    },
    ApiError {
        provider: String,
        attempt: u32,
        code: ProviderErrorCode,
        message: String,
        retryable: bool,
    },
    ValidationFailed {
        provider: String,
        attempt: u32,
        errors: Vec<Issue>,
    },
    Success {
        provider: String,
        attempt: u32,
        repairs: usize,
    },
    FallbackAttempt {
        provider: String,
        reason: String,
    },
    ProviderUnavailable {
        provider: String,
    },
    AllFailed {
        providers_tried: Vec<String>,
    },
    Cancelled {
        provider: String,
        attempt: u32,
    },
}

impl PipelineStep {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::PromptBuilt { .. } => "prompt_built",
            PipelineStep::Attempt { .. } => "attempt",
            PipelineStep::ApiError { .. } => "api_error",
            PipelineStep::ValidationFailed { .. } => "validation_failed",
            PipelineStep::Success { .. } => "success",
            PipelineStep::FallbackAttempt { .. } => "fallback_attempt",
            PipelineStep::ProviderUnavailable { .. } => "provider_unavailable",
            PipelineStep::AllFailed { .. } => "all_failed",
            PipelineStep::Cancelled { .. } => "cancelled",
        }
    }
}

/// 带时间戳的步骤事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineEvent {
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub step: PipelineStep,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PipelineLog {
    events: Vec<PipelineEvent>,
}

impl PipelineLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: PipelineStep) {
        self.events.push(PipelineEvent {
            time: Utc::now(),
            step,
        });
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn steps(&self) -> impl Iterator<Item = &PipelineStep> {
        self.events.iter().map(|event| &event.step)
    }

    /// 按步骤名计数，如 `count("api_error")`
    pub fn count(&self, name: &str) -> usize {
        self.steps().filter(|step| step.name() == name).count()
    }

    /// 全部提供方的尝试总数
    pub fn attempt_count(&self) -> usize {
        self.count("attempt")
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps().map(PipelineStep::name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// 最后一次尝试的部分结果（用于诊断）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialResult {
    pub provider: String,
    pub attempt: u32,
    pub errors: Vec<Issue>,
    /// 修复后仍未通过校验的树
    pub data: Option<JsonValue>,
}
