use serde::{Deserialize, Serialize};

use crate::models::document::{Document, StructuralCounts};
use crate::models::issue::RepairEntry;

/// 变体内容：布局树或纯文本
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VariationContent {
    Document(Document),
    Text(String),
}

impl VariationContent {
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            VariationContent::Document(doc) => Some(doc),
            VariationContent::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VariationContent::Text(text) => Some(text),
            VariationContent::Document(_) => None,
        }
    }
}

/// 一次请求中单个候选输出的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    /// `layout-N` / `text-N`
    pub id: String,
    /// `Variation N`，N 为原始消息的 1-based 序号
    pub label: String,
    pub summary: String,
    pub content: VariationContent,
    pub source_raw: String,
    pub structural_counts: Option<StructuralCounts>,
    #[serde(rename = "repairsApplied")]
    pub repairs: Vec<RepairEntry>,
}

/// 调用方提供的限流 / 配额上下文，随空响应错误一起返回
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitContext {
    pub remaining_requests: Option<u64>,
    pub reset_after_secs: Option<u64>,
    pub message: Option<String>,
}

impl std::fmt::Display for RateLimitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(remaining) = self.remaining_requests {
            parts.push(format!("remaining={}", remaining));
        }
        if let Some(reset) = self.reset_after_secs {
            parts.push(format!("reset_after={}s", reset));
        }
        if let Some(message) = &self.message {
            parts.push(message.clone());
        }
        f.write_str(&parts.join(", "))
    }
}
