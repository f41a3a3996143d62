//! 提供方适配器接口 - 基础设施层
//!
//! 只暴露"发送提示词，拿回原始文本"的能力，不关心校验和修复。

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;
use crate::models::variation::RateLimitContext;

/// 一次请求最多要求的变体数量
pub const MAX_VARIATIONS: u8 = 4;

/// 响应类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    #[default]
    Document,
    Text,
}

/// 请求参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// 期望的候选数量，发送前会被限制在 1..=4
    pub variations: u8,
    pub kind: ResponseKind,
}

impl RequestOptions {
    pub fn variation_count(&self) -> u8 {
        self.variations.clamp(1, MAX_VARIATIONS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub system: String,
    pub prompt: String,
    pub options: RequestOptions,
}

/// 提供方返回的原始响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub kind: ResponseKind,
    pub messages: Vec<String>,
    /// 供应商返回的限流信息（如有）
    pub rate_limit: Option<RateLimitContext>,
}

impl RawResponse {
    pub fn document(messages: Vec<String>) -> Self {
        Self {
            kind: ResponseKind::Document,
            messages,
            rate_limit: None,
        }
    }

    pub fn text(messages: Vec<String>) -> Self {
        Self {
            kind: ResponseKind::Text,
            messages,
            rate_limit: None,
        }
    }
}

/// 提供方适配器
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 提供方标识（`openai` / `grok` / `anthropic` ...）
    fn name(&self) -> &str;

    async fn send(&self, request: &ProviderRequest) -> Result<RawResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variation_count_is_clamped() {
        let mut options = RequestOptions::default();
        assert_eq!(options.variation_count(), 1);
        options.variations = 9;
        assert_eq!(options.variation_count(), MAX_VARIATIONS);
        options.variations = 3;
        assert_eq!(options.variation_count(), 3);
    }
}
