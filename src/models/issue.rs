//! 校验问题与修复记录
//!
//! 两者共用同一种路径约定：`root.elements[0].elements[1]`。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 校验问题代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // ---- 致命错误 ----
    InvalidJson,
    NotArray,
    MissingElements,
    ElementsNotArray,
    ElementNotObject,
    MissingId,
    InvalidIdType,
    DuplicateId,
    MissingKind,
    InvalidKind,
    MissingWidgetKind,
    SettingsNotObject,
    /// 响应中没有可处理的布局内容
    NoContent,

    // ---- 警告 ----
    IdFormat,
    HierarchyRoot,
    HierarchySection,
    HierarchyColumn,
    HierarchyContainer,
    UnknownWidgetKind,
    ExtendedWidgetDisabled,
    HeadingNoTitle,
    TextEditorNoContent,
    ImageNoUrl,
    ButtonNoText,
    IconNotSet,

    /// 提供方调用失败（作为重试反馈）
    ProviderFailure,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::InvalidJson => "invalid_json",
            IssueCode::NotArray => "not_array",
            IssueCode::MissingElements => "missing_elements",
            IssueCode::ElementsNotArray => "elements_not_array",
            IssueCode::ElementNotObject => "element_not_object",
            IssueCode::MissingId => "missing_id",
            IssueCode::InvalidIdType => "invalid_id_type",
            IssueCode::DuplicateId => "duplicate_id",
            IssueCode::MissingKind => "missing_kind",
            IssueCode::InvalidKind => "invalid_kind",
            IssueCode::MissingWidgetKind => "missing_widget_kind",
            IssueCode::SettingsNotObject => "settings_not_object",
            IssueCode::NoContent => "no_content",
            IssueCode::IdFormat => "id_format",
            IssueCode::HierarchyRoot => "hierarchy_root",
            IssueCode::HierarchySection => "hierarchy_section",
            IssueCode::HierarchyColumn => "hierarchy_column",
            IssueCode::HierarchyContainer => "hierarchy_container",
            IssueCode::UnknownWidgetKind => "unknown_widget_kind",
            IssueCode::ExtendedWidgetDisabled => "extended_widget_disabled",
            IssueCode::HeadingNoTitle => "heading_no_title",
            IssueCode::TextEditorNoContent => "text_editor_no_content",
            IssueCode::ImageNoUrl => "image_no_url",
            IssueCode::ButtonNoText => "button_no_text",
            IssueCode::IconNotSet => "icon_not_set",
            IssueCode::ProviderFailure => "provider_failure",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条校验问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub message: String,
    pub path: String,
}

impl Issue {
    pub fn new(code: IssueCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (at {})", self.code, self.message, self.path)
    }
}

/// 校验报告
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    pub fn from_issues(errors: Vec<Issue>, warnings: Vec<Issue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|issue| issue.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|issue| issue.code == code)
    }
}

/// 修复类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    // 文本提取
    ExtractedJson,
    FixedJsonSyntax,
    // 结构归一化
    WrappedElements,
    WrappedSingleElement,
    FoundNestedElements,
    // 层级修正
    DroppedNonObject,
    InferredKind,
    NormalizedKind,
    WrappedWidgetInColumn,
    WrappedWidgetInSection,
    WrappedColumnInSection,
    // id
    GeneratedId,
    FixedDuplicateId,
    // widget 类型
    InferredWidgetKind,
    MappedWidgetKind,
    NormalizedWidgetKind,
    // settings
    FixedSettingsType,
    FixedHeadingTitle,
    FixedTextEditor,
    FixedImageStructure,
    FixedButtonText,
    FixedButtonLink,
    FixedIconStructure,
    FixedSocialIcons,
    // 清理
    PrunedNode,
    FixedChildrenType,
}

impl RepairKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairKind::ExtractedJson => "extracted_json",
            RepairKind::FixedJsonSyntax => "fixed_json_syntax",
            RepairKind::WrappedElements => "wrapped_elements",
            RepairKind::WrappedSingleElement => "wrapped_single_element",
            RepairKind::FoundNestedElements => "found_nested_elements",
            RepairKind::DroppedNonObject => "dropped_non_object",
            RepairKind::InferredKind => "inferred_kind",
            RepairKind::NormalizedKind => "normalized_kind",
            RepairKind::WrappedWidgetInColumn => "wrapped_widget_in_column",
            RepairKind::WrappedWidgetInSection => "wrapped_widget_in_section",
            RepairKind::WrappedColumnInSection => "wrapped_column_in_section",
            RepairKind::GeneratedId => "generated_id",
            RepairKind::FixedDuplicateId => "fixed_duplicate_id",
            RepairKind::InferredWidgetKind => "inferred_widget_kind",
            RepairKind::MappedWidgetKind => "mapped_widget_kind",
            RepairKind::NormalizedWidgetKind => "normalized_widget_kind",
            RepairKind::FixedSettingsType => "fixed_settings_type",
            RepairKind::FixedHeadingTitle => "fixed_heading_title",
            RepairKind::FixedTextEditor => "fixed_text_editor",
            RepairKind::FixedImageStructure => "fixed_image_structure",
            RepairKind::FixedButtonText => "fixed_button_text",
            RepairKind::FixedButtonLink => "fixed_button_link",
            RepairKind::FixedIconStructure => "fixed_icon_structure",
            RepairKind::FixedSocialIcons => "fixed_social_icons",
            RepairKind::PrunedNode => "pruned_node",
            RepairKind::FixedChildrenType => "fixed_children_type",
        }
    }
}

impl fmt::Display for RepairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条修复审计记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairEntry {
    #[serde(rename = "type")]
    pub kind: RepairKind,
    pub message: String,
    pub path: String,
}

impl RepairEntry {
    pub fn new(kind: RepairKind, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: path.into(),
        }
    }
}

/// 路径拼接：`root` + 序号 → `root.elements[3]`
pub fn child_path(parent: &str, index: usize) -> String {
    format!("{}.elements[{}]", parent, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_snake_case() {
        let issue = Issue::new(IssueCode::DuplicateId, "dup", "root.elements[0]");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["code"], "duplicate_id");
        assert_eq!(IssueCode::DuplicateId.as_str(), "duplicate_id");

        let entry = RepairEntry::new(RepairKind::GeneratedId, "gen", "root");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "generated_id");
    }

    #[test]
    fn test_report_validity_ignores_warnings() {
        let report = ValidationReport::from_issues(
            Vec::new(),
            vec![Issue::new(IssueCode::IdFormat, "odd id", "root")],
        );
        assert!(report.valid);
        assert!(report.has_warning(IssueCode::IdFormat));
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("root", 0), "root.elements[0]");
        assert_eq!(
            child_path("root.elements[0]", 2),
            "root.elements[0].elements[2]"
        );
    }
}
