//! 变体组装流程 - 流程层
//!
//! 一次请求可能返回多条候选消息，每条独立处理，只要有一条存活整批就成功。

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::VariationError;
use crate::models::variation::{RateLimitContext, Variation, VariationContent};
use crate::workflow::response_processor::ResponseProcessor;

/// 纯文本摘要的最大字符数
pub const SUMMARY_MAX_CHARS: usize = 140;

/// 变体组装器
#[derive(Debug, Clone, Copy, Default)]
pub struct VariationBuilder {
    processor: ResponseProcessor,
}

fn variation_label(index: usize) -> String {
    format!("Variation {}", index + 1)
}

impl VariationBuilder {
    pub fn new(extended_widgets: bool) -> Self {
        Self {
            processor: ResponseProcessor::new(extended_widgets),
        }
    }

    /// 布局变体：逐条解析、修复、校验，丢弃失败的消息
    pub fn build_document_variations(
        &self,
        messages: &[String],
        rate_limit: Option<RateLimitContext>,
    ) -> Result<Vec<Variation>, VariationError> {
        let mut variations = Vec::new();

        for (index, raw) in messages.iter().enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                debug!("variation {} 为空，跳过", index + 1);
                continue;
            }

            let processed = match self.processor.process(raw) {
                Ok(processed) => processed,
                Err(rejected) => {
                    warn!(
                        "⚠️ variation {} 被丢弃: {} 个错误 (首个: {})",
                        index + 1,
                        rejected.errors.len(),
                        rejected
                            .errors
                            .first()
                            .map(|issue| issue.message.as_str())
                            .unwrap_or("-")
                    );
                    continue;
                }
            };

            for issue in &processed.warnings {
                warn!(
                    "variation {} warning: {} (at {})",
                    index + 1,
                    issue.message,
                    issue.path
                );
            }

            let counts = processed.document.structural_counts();
            variations.push(Variation {
                id: format!("layout-{}", index + 1),
                label: variation_label(index),
                summary: counts.describe(),
                content: VariationContent::Document(processed.document),
                source_raw: raw.to_string(),
                structural_counts: Some(counts),
                repairs: processed.repairs,
            });
        }

        if variations.is_empty() {
            return Err(VariationError::EmptyResponse { rate_limit });
        }

        debug!("✓ {}/{} 条消息生成了变体", variations.len(), messages.len());
        Ok(variations)
    }

    /// 纯文本变体
    pub fn build_text_variations(
        &self,
        messages: &[String],
        rate_limit: Option<RateLimitContext>,
    ) -> Result<Vec<Variation>, VariationError> {
        let variations: Vec<Variation> = messages
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let content = raw.trim();
                if content.is_empty() {
                    return None;
                }
                let label = variation_label(index);
                let summary = summarize_text(content).unwrap_or_else(|| label.clone());
                Some(Variation {
                    id: format!("text-{}", index + 1),
                    label,
                    summary,
                    content: VariationContent::Text(content.to_string()),
                    source_raw: content.to_string(),
                    structural_counts: None,
                    repairs: Vec::new(),
                })
            })
            .collect();

        if variations.is_empty() {
            return Err(VariationError::EmptyResponse { rate_limit });
        }
        Ok(variations)
    }
}

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

/// 去标签、合并空白，超过 140 字符时截断为 137 字符加省略号
pub fn summarize_text(content: &str) -> Option<String> {
    let stripped = match tag_pattern() {
        Some(pattern) => pattern.replace_all(content, " ").into_owned(),
        None => content.to_string(),
    };
    let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.is_empty() {
        return None;
    }

    if text.chars().count() > SUMMARY_MAX_CHARS {
        let truncated: String = text.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        Some(format!("{}…", truncated))
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_partial_batch_keeps_survivors() {
        let builder = VariationBuilder::default();
        let variations = builder
            .build_document_variations(
                &messages(&[
                    "",
                    "not json",
                    r#"{"elements":[{"id":"x1","elType":"section","elements":[]}]}"#,
                ]),
                None,
            )
            .unwrap();

        assert_eq!(variations.len(), 1);
        let variation = &variations[0];
        assert_eq!(variation.label, "Variation 3");
        assert_eq!(variation.id, "layout-3");
        assert_eq!(variation.summary, "1 section");
        assert!(variation.repairs.is_empty());
        assert!(variation.content.as_document().is_some());
    }

    #[test]
    fn test_all_failed_is_empty_response_with_rate_limit() {
        let rate_limit = RateLimitContext {
            remaining_requests: Some(0),
            reset_after_secs: Some(30),
            message: None,
        };
        let err = VariationBuilder::default()
            .build_document_variations(&messages(&["", "nope"]), Some(rate_limit.clone()))
            .unwrap_err();
        assert_eq!(
            err,
            VariationError::EmptyResponse {
                rate_limit: Some(rate_limit)
            }
        );
    }

    #[test]
    fn test_summary_counts_repaired_tree() {
        let raw = r#"[{"elType":"widget","widgetType":"heading","settings":{"title":"Hi"}},{"elType":"widget","widgetType":"divider"}]"#;
        let variations = VariationBuilder::default()
            .build_document_variations(&messages(&[raw]), None)
            .unwrap();
        assert_eq!(variations[0].summary, "2 sections • 2 columns • 2 widgets");
        assert!(!variations[0].repairs.is_empty());
    }

    #[test]
    fn test_text_variations() {
        let long = format!("<p>{}</p>", "word ".repeat(60));
        let variations = VariationBuilder::default()
            .build_text_variations(&messages(&["<h1>Hello</h1>\n<p>world</p>", "  ", &long]), None)
            .unwrap();

        assert_eq!(variations.len(), 2);
        assert_eq!(variations[0].summary, "Hello world");
        assert_eq!(variations[1].label, "Variation 3");
        assert_eq!(variations[1].summary.chars().count(), 138);
        assert!(variations[1].summary.ends_with('…'));
    }

    #[test]
    fn test_tag_only_text_uses_label() {
        assert_eq!(summarize_text("<br/>"), None);
        let variations = VariationBuilder::default()
            .build_text_variations(&messages(&["<br/>"]), None)
            .unwrap();
        assert_eq!(variations[0].summary, "Variation 1");
    }
}
