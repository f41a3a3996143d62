//! 布局结构校验服务 - 业务能力层
//!
//! 只负责"判断一棵树是否合法"，不做任何修复。
//! 深度优先、从左到右遍历一次，局部出错后仍继续深入子节点，
//! 一次调用给出完整的问题列表。

use std::collections::HashSet;

use serde_json::{Map, Value as JsonValue};

use crate::models::document::{Document, NodeKind, ParentKind};
use crate::models::issue::{child_path, Issue, IssueCode, ValidationReport};
use crate::models::widget_catalog::{self, WidgetTier};

/// 根路径
pub const ROOT_PATH: &str = "root";

/// 校验 / 修复的输入：原始文本或已解析的树
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Raw(&'a str),
    Tree(&'a JsonValue),
}

impl<'a> From<&'a str> for Candidate<'a> {
    fn from(text: &'a str) -> Self {
        Candidate::Raw(text)
    }
}

impl<'a> From<&'a String> for Candidate<'a> {
    fn from(text: &'a String) -> Self {
        Candidate::Raw(text.as_str())
    }
}

impl<'a> From<&'a JsonValue> for Candidate<'a> {
    fn from(tree: &'a JsonValue) -> Self {
        Candidate::Tree(tree)
    }
}

/// 结构校验器
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    extended_enabled: bool,
}

impl SchemaValidator {
    pub fn new(extended_enabled: bool) -> Self {
        Self { extended_enabled }
    }

    pub fn extended_enabled(&self) -> bool {
        self.extended_enabled
    }

    /// 校验原始文本或已解析的树
    ///
    /// 文本只做一次直接解析，失败即报告 `invalid_json`，不尝试提取或修复。
    pub fn validate<'a>(&self, input: impl Into<Candidate<'a>>) -> ValidationReport {
        match input.into() {
            Candidate::Raw(text) => match serde_json::from_str::<JsonValue>(text) {
                Ok(value) => self.validate_value(&value),
                Err(e) => ValidationReport::from_issues(
                    vec![Issue::new(
                        IssueCode::InvalidJson,
                        format!("Input is not valid JSON: {}", e),
                        ROOT_PATH,
                    )],
                    Vec::new(),
                ),
            },
            Candidate::Tree(value) => self.validate_value(value),
        }
    }

    pub fn validate_document(&self, document: &Document) -> ValidationReport {
        self.validate_value(&document.to_value())
    }

    fn validate_value(&self, value: &JsonValue) -> ValidationReport {
        let mut walk = ValidationWalk::new(self.extended_enabled);

        match value {
            JsonValue::Object(root) => match root.get("elements") {
                Some(JsonValue::Array(elements)) => {
                    walk.elements(elements, ROOT_PATH, ParentKind::Root)
                }
                Some(_) => walk.error(
                    IssueCode::ElementsNotArray,
                    "Elements must be an array.",
                    ROOT_PATH,
                ),
                None if root.contains_key("elType") => {
                    walk.element(value, &child_path(ROOT_PATH, 0), ParentKind::Root)
                }
                None => walk.missing_elements(),
            },
            JsonValue::Array(elements) if elements.first().is_some_and(JsonValue::is_object) => {
                walk.elements(elements, ROOT_PATH, ParentKind::Root)
            }
            JsonValue::Array(_) => walk.missing_elements(),
            _ => walk.error(
                IssueCode::NotArray,
                "Layout data must be an array or object.",
                ROOT_PATH,
            ),
        }

        walk.finish()
    }
}

/// 单次遍历的局部状态
struct ValidationWalk {
    extended_enabled: bool,
    seen_ids: HashSet<String>,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl ValidationWalk {
    fn new(extended_enabled: bool) -> Self {
        Self {
            extended_enabled,
            seen_ids: HashSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(self) -> ValidationReport {
        ValidationReport::from_issues(self.errors, self.warnings)
    }

    fn error(&mut self, code: IssueCode, message: impl Into<String>, path: &str) {
        self.errors.push(Issue::new(code, message, path));
    }

    fn warning(&mut self, code: IssueCode, message: impl Into<String>, path: &str) {
        self.warnings.push(Issue::new(code, message, path));
    }

    fn missing_elements(&mut self) {
        self.error(
            IssueCode::MissingElements,
            "No valid layout elements found. Expected \"elements\" array or array of element objects.",
            ROOT_PATH,
        );
    }

    fn elements(&mut self, elements: &[JsonValue], path: &str, parent: ParentKind) {
        for (index, element) in elements.iter().enumerate() {
            self.element(element, &child_path(path, index), parent);
        }
    }

    fn element(&mut self, element: &JsonValue, path: &str, parent: ParentKind) {
        let Some(node) = element.as_object() else {
            self.error(IssueCode::ElementNotObject, "Element must be an object.", path);
            return;
        };

        self.check_id(node, path);

        let kind = match node.get("elType") {
            None => {
                self.error(
                    IssueCode::MissingKind,
                    "Element is missing required \"elType\" property.",
                    path,
                );
                ParentKind::Unknown
            }
            Some(raw) => match raw.as_str().and_then(NodeKind::parse) {
                Some(kind) => {
                    self.check_hierarchy(parent, kind, path);
                    if kind == NodeKind::Widget {
                        self.check_widget(node, path);
                    }
                    ParentKind::Node(kind)
                }
                None => {
                    self.error(
                        IssueCode::InvalidKind,
                        format!(
                            "Invalid element type {}. Must be one of: section, column, widget, container",
                            raw
                        ),
                        path,
                    );
                    ParentKind::Unknown
                }
            },
        };

        if let Some(settings) = node.get("settings") {
            if !settings.is_object() {
                self.error(
                    IssueCode::SettingsNotObject,
                    "Element settings must be an object.",
                    &format!("{}.settings", path),
                );
            }
        }

        match node.get("elements") {
            Some(JsonValue::Array(children)) => self.elements(children, path, kind),
            Some(_) => self.error(IssueCode::ElementsNotArray, "Elements must be an array.", path),
            None => {}
        }
    }

    fn check_id(&mut self, node: &Map<String, JsonValue>, path: &str) {
        let id = match node.get("id") {
            None => {
                self.error(
                    IssueCode::MissingId,
                    "Element is missing required \"id\" property.",
                    path,
                );
                return;
            }
            Some(JsonValue::String(id)) if !id.is_empty() => id,
            Some(_) => {
                self.error(
                    IssueCode::InvalidIdType,
                    "Element ID must be a non-empty string.",
                    path,
                );
                return;
            }
        };

        if !has_conventional_id_shape(id) {
            self.warning(
                IssueCode::IdFormat,
                format!(
                    "Element ID \"{}\" does not match the usual format (1-10 alphanumeric characters).",
                    id
                ),
                path,
            );
        }

        if !self.seen_ids.insert(id.clone()) {
            self.error(
                IssueCode::DuplicateId,
                format!("Duplicate element ID \"{}\" found.", id),
                path,
            );
        }
    }

    fn check_hierarchy(&mut self, parent: ParentKind, kind: NodeKind, path: &str) {
        if NodeKind::accepts_child(parent, kind) {
            return;
        }

        let (code, message) = match parent {
            ParentKind::Root => (
                IssueCode::HierarchyRoot,
                format!(
                    "Root level elements should typically be sections or containers, found \"{}\".",
                    kind
                ),
            ),
            ParentKind::Node(NodeKind::Section) => (
                IssueCode::HierarchySection,
                format!("Sections typically contain columns, found \"{}\".", kind),
            ),
            ParentKind::Node(NodeKind::Column) => (
                IssueCode::HierarchyColumn,
                format!("Columns typically contain widgets, found \"{}\".", kind),
            ),
            ParentKind::Node(NodeKind::Container) => (
                IssueCode::HierarchyContainer,
                format!(
                    "Containers typically contain widgets or nested containers, found \"{}\".",
                    kind
                ),
            ),
            ParentKind::Node(NodeKind::Widget) | ParentKind::Unknown => return,
        };
        self.warning(code, message, path);
    }

    fn check_widget(&mut self, node: &Map<String, JsonValue>, path: &str) {
        let widget_kind = match node.get("widgetType") {
            Some(JsonValue::String(kind)) if !kind.trim().is_empty() => kind,
            _ => {
                self.error(
                    IssueCode::MissingWidgetKind,
                    "Widget element is missing required \"widgetType\" property.",
                    path,
                );
                return;
            }
        };

        let Some(spec) = widget_catalog::lookup(widget_kind) else {
            self.warning(
                IssueCode::UnknownWidgetKind,
                format!(
                    "Unknown widget type \"{}\". This may be a third-party widget or typo.",
                    widget_kind
                ),
                path,
            );
            return;
        };

        if spec.tier == WidgetTier::Extended && !self.extended_enabled {
            self.warning(
                IssueCode::ExtendedWidgetDisabled,
                format!(
                    "Widget \"{}\" requires the extended widget set, which is not enabled.",
                    widget_kind
                ),
                path,
            );
        }

        if let Some(check) = spec.check {
            let empty = Map::new();
            let settings = node
                .get("settings")
                .and_then(JsonValue::as_object)
                .unwrap_or(&empty);
            if let Some((code, message)) = check(settings) {
                self.warning(code, message, &format!("{}.settings", path));
            }
        }
    }
}

fn has_conventional_id_shape(id: &str) -> bool {
    (1..=10).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric())
}
