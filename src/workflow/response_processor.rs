//! 单条响应处理流程 - 流程层
//!
//! 核心职责：定义"一条原始消息"变成合法布局的完整流程
//!
//! 流程顺序：
//! 1. 直接解析，失败则交给修复引擎提取
//! 2. 结构校验
//! 3. 有致命错误时针对性修复一次，再次校验
//! 4. 仍不合法则拒绝

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::models::document::Document;
use crate::models::issue::{Issue, IssueCode, RepairEntry};
use crate::services::{JsonRepair, SchemaValidator, ROOT_PATH};

/// 通过校验的消息
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedMessage {
    pub document: Document,
    pub repairs: Vec<RepairEntry>,
    pub warnings: Vec<Issue>,
}

/// 被拒绝的消息
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMessage {
    pub errors: Vec<Issue>,
    /// 修复后仍不合法的树（无法解析时为 None）
    pub data: Option<JsonValue>,
    pub repairs: Vec<RepairEntry>,
}

impl RejectedMessage {
    fn single(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            errors: vec![Issue::new(code, message, ROOT_PATH)],
            data: None,
            repairs: Vec::new(),
        }
    }
}

/// 响应处理流程
///
/// - 只处理一条消息
/// - 不关心消息来自哪个提供方、第几次尝试
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseProcessor {
    validator: SchemaValidator,
    repair: JsonRepair,
}

impl ResponseProcessor {
    pub fn new(extended_widgets: bool) -> Self {
        Self {
            validator: SchemaValidator::new(extended_widgets),
            repair: JsonRepair::new(),
        }
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    pub fn process(&self, raw: &str) -> Result<ProcessedMessage, RejectedMessage> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RejectedMessage::single(
                IssueCode::NoContent,
                "Response contained no content.",
            ));
        }

        let mut repairs = Vec::new();

        // 1. 解析
        let value = match serde_json::from_str::<JsonValue>(raw) {
            Ok(value) if value.is_object() || value.is_array() => value,
            _ => {
                let result = self.repair.repair(raw);
                match result.data {
                    Some(data) if result.success && (data.is_object() || data.is_array()) => {
                        repairs.extend(result.repairs);
                        data
                    }
                    _ => {
                        let message = result
                            .error
                            .unwrap_or_else(|| "Response could not be parsed as JSON.".to_string());
                        debug!("消息无法解析: {}", message);
                        return Err(RejectedMessage::single(IssueCode::InvalidJson, message));
                    }
                }
            }
        };

        self.process_value(value, repairs)
    }

    /// 对已解析的树执行"校验 → 修复 → 再校验"
    pub fn process_value(
        &self,
        value: JsonValue,
        mut repairs: Vec<RepairEntry>,
    ) -> Result<ProcessedMessage, RejectedMessage> {
        // 2. 第一次校验
        let mut report = self.validator.validate(&value);
        let mut value = value;

        // 3. 针对性修复后再校验
        if !report.valid {
            debug!("第一次校验失败 ({} 个错误)，尝试修复", report.errors.len());
            let result = self.repair.repair(&value);
            if let (true, Some(data)) = (result.success, result.data) {
                repairs.extend(result.repairs);
                value = data;
                report = self.validator.validate(&value);
            }
        }

        if !report.valid {
            return Err(RejectedMessage {
                errors: report.errors,
                data: Some(value),
                repairs,
            });
        }

        match Document::from_value(value) {
            Ok(document) => Ok(ProcessedMessage {
                document,
                repairs,
                warnings: report.warnings,
            }),
            Err(e) => Err(RejectedMessage {
                errors: vec![Issue::new(
                    IssueCode::InvalidJson,
                    format!("Validated layout could not be decoded: {}", e),
                    ROOT_PATH,
                )],
                data: None,
                repairs,
            }),
        }
    }
}
