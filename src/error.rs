use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::pipeline_log::{PartialResult, PipelineLog};
use crate::models::variation::RateLimitContext;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 提供方调用错误
    #[error("提供方错误: {0}")]
    Provider(#[from] ProviderError),
    /// 变体组装错误
    #[error("变体错误: {0}")]
    Variation(#[from] VariationError),
    /// 生成流水线错误
    #[error("流水线错误: {0}")]
    Pipeline(#[from] PipelineError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

// ========== 提供方错误 ==========

/// 提供方错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    Unauthorized,
    MissingApiKey,
    RateLimited,
    Timeout,
    Server,
    Network,
    InvalidResponse,
    EmptyResponse,
    Other,
}

impl ProviderErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderErrorCode::Unauthorized => "unauthorized",
            ProviderErrorCode::MissingApiKey => "missing_api_key",
            ProviderErrorCode::RateLimited => "rate_limited",
            ProviderErrorCode::Timeout => "timeout",
            ProviderErrorCode::Server => "server",
            ProviderErrorCode::Network => "network",
            ProviderErrorCode::InvalidResponse => "invalid_response",
            ProviderErrorCode::EmptyResponse => "empty_response",
            ProviderErrorCode::Other => "other",
        }
    }

    /// 认证失败、缺少凭据、限流均不可重试
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            ProviderErrorCode::Unauthorized
                | ProviderErrorCode::MissingApiKey
                | ProviderErrorCode::RateLimited
        )
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 提供方适配器返回的错误
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("[{code}] {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn missing_api_key(provider: &str) -> Self {
        Self::new(
            ProviderErrorCode::MissingApiKey,
            format!("No API key configured for provider \"{}\".", provider),
        )
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(
            ProviderErrorCode::Timeout,
            format!("Provider request timed out after {}s.", secs),
        )
    }

    pub fn empty_response() -> Self {
        Self::new(
            ProviderErrorCode::EmptyResponse,
            "Provider returned no message content.",
        )
    }
}

// ========== 变体错误 ==========

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariationError {
    /// 所有消息都无法解析或校验
    #[error("响应中没有可用的布局变体{}", format_rate_limit(.rate_limit))]
    EmptyResponse { rate_limit: Option<RateLimitContext> },
}

fn format_rate_limit(rate_limit: &Option<RateLimitContext>) -> String {
    match rate_limit {
        Some(ctx) => format!(" (限流信息: {})", ctx),
        None => String::new(),
    }
}

// ========== 流水线错误 ==========

/// 生成流水线的终止错误，所有变体都携带完整的步骤日志
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 不可重试错误，整个流程立即终止（包括备用提供方）
    #[error("提供方 {provider} 返回不可重试错误: {source}")]
    NonRetryable {
        provider: String,
        source: ProviderError,
        log: PipelineLog,
    },
    /// 所有提供方的所有尝试均失败
    #[error("所有提供方均未生成有效布局 (共尝试 {} 次)", .log.attempt_count())]
    Exhausted {
        log: PipelineLog,
        last_result: Option<Box<PartialResult>>,
        last_error: Option<ProviderError>,
    },
    /// 调用方取消或超时
    #[error("生成已取消")]
    Cancelled { log: PipelineLog },
}

impl PipelineError {
    pub fn log(&self) -> &PipelineLog {
        match self {
            PipelineError::NonRetryable { log, .. }
            | PipelineError::Exhausted { log, .. }
            | PipelineError::Cancelled { log } => log,
        }
    }
}

// ========== 配置错误 ==========

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 ({path}): {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("解析配置文件失败 ({path}): {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    #[error("未知的提供方: {name}")]
    UnknownProvider { name: String },
    #[error("max_retries 超出范围: {value} (上限 {max})")]
    RetriesOutOfRange { value: u32, max: u32 },
}

// ========== 文件错误 ==========

#[derive(Debug, Error)]
pub enum FileError {
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    pub fn other(message: impl Into<String>) -> Self {
        AppError::Other(message.into())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_codes() {
        assert!(!ProviderErrorCode::Unauthorized.is_retryable());
        assert!(!ProviderErrorCode::MissingApiKey.is_retryable());
        assert!(!ProviderErrorCode::RateLimited.is_retryable());
        assert!(ProviderErrorCode::Timeout.is_retryable());
        assert!(ProviderErrorCode::Server.is_retryable());

        let err = ProviderError::missing_api_key("openai");
        assert!(!err.retryable);
        assert!(err.to_string().starts_with("[missing_api_key]"));
    }

    #[test]
    fn test_empty_response_carries_rate_limit() {
        let err = VariationError::EmptyResponse {
            rate_limit: Some(RateLimitContext {
                remaining_requests: Some(0),
                reset_after_secs: Some(30),
                message: None,
            }),
        };
        let text = err.to_string();
        assert!(text.contains("remaining=0"));
        assert!(text.contains("reset_after=30s"));
    }
}
