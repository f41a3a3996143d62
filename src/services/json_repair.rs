//! JSON 修复服务 - 业务能力层
//!
//! 对模型输出做尽力而为的修复，每一步修改都记录在 `repairs` 中。
//!
//! 阶段顺序：
//! 1. 文本提取（仅字符串输入）
//! 2. 结构归一化
//! 3. 层级修正
//! 4. id 修复
//! 5. widget 类型修复
//! 6. settings 修复
//! 7. 清理
//!
//! 每次调用都从输入的副本出发，id 计数器等状态只在单次调用内有效。

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::models::document::{NodeKind, ParentKind};
use crate::models::issue::{child_path, RepairEntry, RepairKind};
use crate::models::widget_catalog::{self, COLUMN_SIZE_KEY, FULL_COLUMN_SIZE};
use crate::services::json_extract::extract_json;
use crate::services::schema_validator::{Candidate, ROOT_PATH};

type Settings = Map<String, JsonValue>;

/// 修复结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairResult {
    pub success: bool,
    pub data: Option<JsonValue>,
    pub repairs: Vec<RepairEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepairResult {
    fn success(data: JsonValue, log: RepairLog) -> Self {
        Self {
            success: true,
            data: Some(data),
            repairs: log.entries,
            error: None,
        }
    }

    fn failure(log: RepairLog, error: &str) -> Self {
        Self {
            success: false,
            data: None,
            repairs: log.entries,
            error: Some(error.to_string()),
        }
    }

    pub fn has_repair(&self, kind: RepairKind) -> bool {
        self.repairs.iter().any(|entry| entry.kind == kind)
    }
}

/// 修复记录
#[derive(Debug, Default)]
struct RepairLog {
    entries: Vec<RepairEntry>,
}

impl RepairLog {
    fn push(&mut self, kind: RepairKind, message: impl Into<String>, path: &str) {
        self.entries.push(RepairEntry::new(kind, message, path));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 单次修复内的 id 生成器
///
/// 生成 7 位十六进制 id，跳过树中已有的 id 以及本次已生成的 id。
/// 同一输入得到同一组 id。
#[derive(Debug)]
pub struct IdGenerator {
    counter: u64,
    reserved: HashSet<String>,
}

impl IdGenerator {
    pub fn new(reserved: HashSet<String>) -> Self {
        Self {
            counter: 0,
            reserved,
        }
    }

    pub fn next_id(&mut self) -> String {
        loop {
            self.counter += 1;
            let id = format!("{:07x}", splitmix64(self.counter) & 0x0fff_ffff);
            if self.reserved.insert(id.clone()) {
                return id;
            }
        }
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// JSON 修复引擎（无状态，可并发调用）
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRepair;

impl JsonRepair {
    pub fn new() -> Self {
        Self
    }

    pub fn repair<'a>(&self, input: impl Into<Candidate<'a>>) -> RepairResult {
        let mut log = RepairLog::default();

        // 阶段 1：文本提取
        let value = match input.into() {
            Candidate::Raw(text) => match extract_json(text) {
                Some(extracted) => {
                    for kind in extracted.fixes {
                        let message = match kind {
                            RepairKind::ExtractedJson => {
                                "Extracted JSON from surrounding text/markdown."
                            }
                            _ => "Fixed JSON syntax errors (trailing commas, quotes, bare keys).",
                        };
                        log.push(kind, message, ROOT_PATH);
                    }
                    extracted.value
                }
                None => {
                    debug!("修复失败: 无法从文本中提取 JSON");
                    return RepairResult::failure(log, "Could not extract valid JSON from input.");
                }
            },
            Candidate::Tree(tree) => tree.clone(),
        };

        if !value.is_object() && !value.is_array() {
            return RepairResult::failure(log, "Input is not an object or array.");
        }

        // 阶段 2：结构归一化
        let value = normalize_structure(value, &mut log);

        let mut root = match value {
            JsonValue::Object(root) if matches!(root.get("elements"), Some(JsonValue::Array(_))) => {
                root
            }
            other => {
                debug!("无法归一化为 elements 结构，原样返回");
                return RepairResult::success(other, log);
            }
        };

        let elements = match root.get_mut("elements") {
            Some(JsonValue::Array(items)) => std::mem::take(items),
            _ => Vec::new(),
        };

        let mut ids = IdGenerator::new(collect_ids(&elements));

        let before = log.len();
        let elements = fix_hierarchy(elements, ParentKind::Root, ROOT_PATH, &mut ids, &mut log);
        log_stage("层级修正", before, &log);

        let before = log.len();
        let mut used_ids = HashSet::new();
        let elements = fix_ids(elements, ROOT_PATH, &mut used_ids, &mut ids, &mut log);
        log_stage("id 修复", before, &log);

        let before = log.len();
        let elements = fix_widget_kinds(elements, ROOT_PATH, &mut log);
        log_stage("widget 类型修复", before, &log);

        let before = log.len();
        let elements = fix_settings(elements, ROOT_PATH, &mut log);
        log_stage("settings 修复", before, &log);

        let before = log.len();
        let elements = prune(elements, ROOT_PATH, &mut log);
        log_stage("清理", before, &log);

        root.insert("elements".to_string(), JsonValue::Array(elements));
        RepairResult::success(JsonValue::Object(root), log)
    }
}

fn log_stage(stage: &str, before: usize, log: &RepairLog) {
    let applied = log.len() - before;
    if applied > 0 {
        debug!("修复阶段 [{}]: {} 项修改", stage, applied);
    }
}

// ========== 阶段 2：结构归一化 ==========

fn looks_like_node(value: &JsonValue) -> bool {
    value
        .as_object()
        .is_some_and(|node| node.contains_key("elType") || node.contains_key("widgetType"))
}

fn looks_like_node_list(value: &JsonValue) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(looks_like_node)
}

fn normalize_structure(value: JsonValue, log: &mut RepairLog) -> JsonValue {
    match value {
        JsonValue::Object(map) if matches!(map.get("elements"), Some(JsonValue::Array(_))) => {
            JsonValue::Object(map)
        }
        JsonValue::Array(items) => {
            let looks_like_elements = items
                .first()
                .and_then(JsonValue::as_object)
                .is_some_and(|first| first.contains_key("elType") || first.contains_key("id"));
            if looks_like_elements {
                log.push(
                    RepairKind::WrappedElements,
                    "Wrapped bare element array in standard structure.",
                    ROOT_PATH,
                );
                json!({ "elements": items })
            } else {
                JsonValue::Array(items)
            }
        }
        JsonValue::Object(map) if map.contains_key("elType") || map.contains_key("widgetType") => {
            log.push(
                RepairKind::WrappedSingleElement,
                "Wrapped single element in elements array.",
                ROOT_PATH,
            );
            json!({ "elements": [JsonValue::Object(map)] })
        }
        JsonValue::Object(map) => {
            let nested = map
                .iter()
                .find(|(_, value)| looks_like_node(value) || looks_like_node_list(value));
            match nested {
                Some((key, value)) => {
                    log.push(
                        RepairKind::FoundNestedElements,
                        format!("Found elements under \"{}\" key and normalized structure.", key),
                        ROOT_PATH,
                    );
                    if value.is_array() {
                        json!({ "elements": value.clone() })
                    } else {
                        json!({ "elements": [value.clone()] })
                    }
                }
                None => JsonValue::Object(map),
            }
        }
        other => other,
    }
}

/// 收集树中所有字符串 id
fn collect_ids(elements: &[JsonValue]) -> HashSet<String> {
    let mut ids = HashSet::new();
    let mut stack: Vec<&JsonValue> = elements.iter().collect();
    while let Some(element) = stack.pop() {
        let Some(node) = element.as_object() else {
            continue;
        };
        if let Some(JsonValue::String(id)) = node.get("id") {
            if !id.is_empty() {
                ids.insert(id.clone());
            }
        }
        if let Some(JsonValue::Array(children)) = node.get("elements") {
            stack.extend(children.iter());
        }
    }
    ids
}

// ========== 阶段 3：层级修正 ==========

fn fix_hierarchy(
    elements: Vec<JsonValue>,
    parent: ParentKind,
    parent_path: &str,
    ids: &mut IdGenerator,
    log: &mut RepairLog,
) -> Vec<JsonValue> {
    let mut fixed = Vec::with_capacity(elements.len());

    for (index, element) in elements.into_iter().enumerate() {
        let path = child_path(parent_path, index);
        let JsonValue::Object(mut node) = element else {
            log.push(
                RepairKind::DroppedNonObject,
                "Dropped element that is not an object.",
                &path,
            );
            continue;
        };

        let kind = resolve_kind(&mut node, parent, &path, log);

        if let Some(JsonValue::Array(children)) = node.get_mut("elements") {
            let taken = std::mem::take(children);
            *children = fix_hierarchy(taken, ParentKind::Node(kind), &path, ids, log);
        }

        let node = JsonValue::Object(node);
        match (parent, kind) {
            (ParentKind::Node(NodeKind::Section), NodeKind::Widget) => {
                log.push(
                    RepairKind::WrappedWidgetInColumn,
                    "Wrapped widget in a column (widgets cannot be direct children of sections).",
                    &path,
                );
                fixed.push(column_wrapper(ids.next_id(), node));
            }
            (ParentKind::Root, NodeKind::Widget) => {
                log.push(
                    RepairKind::WrappedWidgetInSection,
                    "Wrapped widget in section > column structure (widgets cannot be at root level).",
                    &path,
                );
                let section_id = ids.next_id();
                let column = column_wrapper(ids.next_id(), node);
                fixed.push(section_wrapper(section_id, column));
            }
            (ParentKind::Root, NodeKind::Column) => {
                log.push(
                    RepairKind::WrappedColumnInSection,
                    "Wrapped column in section (columns cannot be at root level).",
                    &path,
                );
                fixed.push(section_wrapper(ids.next_id(), node));
            }
            _ => fixed.push(node),
        }
    }

    fixed
}

fn column_wrapper(id: String, child: JsonValue) -> JsonValue {
    json!({
        "id": id,
        "elType": "column",
        "settings": { COLUMN_SIZE_KEY: FULL_COLUMN_SIZE },
        "elements": [child],
    })
}

fn section_wrapper(id: String, child: JsonValue) -> JsonValue {
    json!({
        "id": id,
        "elType": "section",
        "settings": {},
        "elements": [child],
    })
}

/// 确定节点类型：合法值直接使用，大小写错误则规范化，其余情况推断
fn resolve_kind(node: &mut Settings, parent: ParentKind, path: &str, log: &mut RepairLog) -> NodeKind {
    let raw = node.get("elType").cloned();

    if let Some(JsonValue::String(text)) = &raw {
        if let Some(kind) = NodeKind::parse(text) {
            return kind;
        }
        if let Some(kind) = NodeKind::parse(&text.trim().to_lowercase()) {
            log.push(
                RepairKind::NormalizedKind,
                format!("Normalized element type \"{}\" -> \"{}\".", text, kind),
                path,
            );
            node.insert("elType".to_string(), json!(kind.as_str()));
            return kind;
        }
    }

    let kind = infer_node_kind(node, parent);
    let message = match &raw {
        None => format!("Inferred element type as \"{}\".", kind),
        Some(invalid) => format!(
            "Replaced invalid element type {} with inferred \"{}\".",
            invalid, kind
        ),
    };
    log.push(RepairKind::InferredKind, message, path);
    node.insert("elType".to_string(), json!(kind.as_str()));
    kind
}

fn infer_node_kind(node: &Settings, parent: ParentKind) -> NodeKind {
    if node.contains_key("widgetType") {
        return NodeKind::Widget;
    }

    if let Some(settings) = node.get("settings").and_then(JsonValue::as_object) {
        if settings.contains_key(COLUMN_SIZE_KEY) {
            return NodeKind::Column;
        }
        if settings.contains_key("structure") || settings.contains_key("layout") {
            return NodeKind::Section;
        }
    }

    match parent {
        ParentKind::Root => NodeKind::Section,
        ParentKind::Node(NodeKind::Section) => NodeKind::Column,
        ParentKind::Node(NodeKind::Column) | ParentKind::Node(NodeKind::Container) => {
            NodeKind::Widget
        }
        ParentKind::Node(NodeKind::Widget) | ParentKind::Unknown => NodeKind::Section,
    }
}

// ========== 阶段 4：id 修复 ==========

fn fix_ids(
    elements: Vec<JsonValue>,
    parent_path: &str,
    used: &mut HashSet<String>,
    ids: &mut IdGenerator,
    log: &mut RepairLog,
) -> Vec<JsonValue> {
    elements
        .into_iter()
        .enumerate()
        .map(|(index, mut element)| {
            let path = child_path(parent_path, index);
            let Some(node) = element.as_object_mut() else {
                return element;
            };

            let current = match node.get("id") {
                Some(JsonValue::String(id)) if !id.is_empty() => Some(id.clone()),
                _ => None,
            };

            let id = match current {
                None => {
                    let id = ids.next_id();
                    log.push(
                        RepairKind::GeneratedId,
                        format!("Generated missing element ID: {}.", id),
                        &path,
                    );
                    node.insert("id".to_string(), json!(id));
                    id
                }
                Some(old) if used.contains(&old) => {
                    let id = ids.next_id();
                    log.push(
                        RepairKind::FixedDuplicateId,
                        format!("Fixed duplicate ID \"{}\" -> \"{}\".", old, id),
                        &path,
                    );
                    node.insert("id".to_string(), json!(id));
                    id
                }
                Some(id) => id,
            };
            used.insert(id);

            if let Some(JsonValue::Array(children)) = node.get_mut("elements") {
                let taken = std::mem::take(children);
                *children = fix_ids(taken, &path, used, ids, log);
            }
            element
        })
        .collect()
}

// ========== 阶段 5：widget 类型修复 ==========

fn fix_widget_kinds(elements: Vec<JsonValue>, parent_path: &str, log: &mut RepairLog) -> Vec<JsonValue> {
    elements
        .into_iter()
        .enumerate()
        .map(|(index, mut element)| {
            let path = child_path(parent_path, index);
            let Some(node) = element.as_object_mut() else {
                return element;
            };

            if node.get("elType").and_then(JsonValue::as_str) == Some(NodeKind::Widget.as_str()) {
                fix_widget_kind(node, &path, log);
            }

            if let Some(JsonValue::Array(children)) = node.get_mut("elements") {
                let taken = std::mem::take(children);
                *children = fix_widget_kinds(taken, &path, log);
            }
            element
        })
        .collect()
}

fn fix_widget_kind(node: &mut Settings, path: &str, log: &mut RepairLog) {
    let current = match node.get("widgetType") {
        Some(JsonValue::String(kind)) if !kind.trim().is_empty() => kind.clone(),
        _ => {
            let inferred =
                widget_catalog::infer_widget_kind(node.get("settings").and_then(JsonValue::as_object));
            log.push(
                RepairKind::InferredWidgetKind,
                format!("Inferred widget type as \"{}\".", inferred),
                path,
            );
            node.insert("widgetType".to_string(), json!(inferred));
            inferred.to_string()
        }
    };

    if let Some(mapped) = widget_catalog::canonical_synonym(current.trim()) {
        log.push(
            RepairKind::MappedWidgetKind,
            format!("Mapped widget type \"{}\" -> \"{}\".", current, mapped),
            path,
        );
        node.insert("widgetType".to_string(), json!(mapped));
        return;
    }

    let normalized = current.trim().to_lowercase();
    if normalized != current && widget_catalog::is_known_widget(&normalized) {
        log.push(
            RepairKind::NormalizedWidgetKind,
            format!("Normalized widget type \"{}\" -> \"{}\".", current, normalized),
            path,
        );
        node.insert("widgetType".to_string(), json!(normalized));
    }
}

// ========== 阶段 6：settings 修复 ==========

fn fix_settings(elements: Vec<JsonValue>, parent_path: &str, log: &mut RepairLog) -> Vec<JsonValue> {
    elements
        .into_iter()
        .enumerate()
        .map(|(index, mut element)| {
            let path = child_path(parent_path, index);
            let Some(node) = element.as_object_mut() else {
                return element;
            };
            fix_node_settings(node, &path, log);

            if let Some(JsonValue::Array(children)) = node.get_mut("elements") {
                let taken = std::mem::take(children);
                *children = fix_settings(taken, &path, log);
            }
            element
        })
        .collect()
}

fn fix_node_settings(node: &mut Settings, path: &str, log: &mut RepairLog) {
    match node.get("settings") {
        None => {
            node.insert("settings".to_string(), json!({}));
        }
        Some(JsonValue::Object(_)) => {}
        Some(_) => {
            log.push(
                RepairKind::FixedSettingsType,
                "Converted non-object settings to empty object.",
                path,
            );
            node.insert("settings".to_string(), json!({}));
        }
    }

    let kind = node
        .get("elType")
        .and_then(JsonValue::as_str)
        .and_then(NodeKind::parse);
    let widget_kind = node
        .get("widgetType")
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    let Some(settings) = node.get_mut("settings").and_then(JsonValue::as_object_mut) else {
        return;
    };

    match kind {
        Some(NodeKind::Column) => {
            // 缺省宽度静默补齐，不算修复
            if !settings.contains_key(COLUMN_SIZE_KEY) {
                settings.insert(COLUMN_SIZE_KEY.to_string(), json!(FULL_COLUMN_SIZE));
            }
        }
        Some(NodeKind::Widget) => {
            let coerce = widget_kind
                .as_deref()
                .and_then(widget_catalog::lookup)
                .and_then(|spec| spec.coerce);
            if let Some(coerce) = coerce {
                for (repair, message) in coerce(settings) {
                    log.push(repair, message, path);
                }
            }
        }
        _ => {}
    }
}

// ========== 阶段 7：清理 ==========

fn prune(elements: Vec<JsonValue>, parent_path: &str, log: &mut RepairLog) -> Vec<JsonValue> {
    let mut cleaned = Vec::with_capacity(elements.len());

    for (index, element) in elements.into_iter().enumerate() {
        let path = child_path(parent_path, index);
        let JsonValue::Object(mut node) = element else {
            log.push(RepairKind::PrunedNode, "Removed non-object element.", &path);
            continue;
        };

        if !node.contains_key("id") && !node.contains_key("elType") {
            log.push(
                RepairKind::PrunedNode,
                "Removed element without id or elType.",
                &path,
            );
            continue;
        }

        let is_widget =
            node.get("elType").and_then(JsonValue::as_str) == Some(NodeKind::Widget.as_str());

        match node.get_mut("elements") {
            Some(JsonValue::Array(children)) => {
                let taken = std::mem::take(children);
                *children = prune(taken, &path, log);
            }
            Some(other) => {
                log.push(
                    RepairKind::FixedChildrenType,
                    "Replaced non-array elements with an empty array.",
                    &path,
                );
                *other = json!([]);
            }
            None if !is_widget => {
                node.insert("elements".to_string(), json!([]));
            }
            None => {}
        }

        cleaned.push(JsonValue::Object(node));
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::Document;
    use crate::services::schema_validator::SchemaValidator;

    fn repair(input: &str) -> RepairResult {
        JsonRepair::new().repair(input)
    }

    fn kinds(result: &RepairResult) -> Vec<RepairKind> {
        result.repairs.iter().map(|entry| entry.kind).collect()
    }

    #[test]
    fn test_fenced_widget_at_root() {
        let input = "```json\n{\"elements\":[{\"id\":\"\",\"elType\":\"widget\",\"widgetType\":\"heading\",\"settings\":{\"text\":\"Hi\"}}]}\n```";
        let result = repair(input);
        assert!(result.success);

        let data = result.data.clone().unwrap();
        let section = &data["elements"][0];
        assert_eq!(section["elType"], "section");
        let column = &section["elements"][0];
        assert_eq!(column["elType"], "column");
        assert_eq!(column["settings"]["_column_size"], 100);
        let widget = &column["elements"][0];
        assert_eq!(widget["elType"], "widget");
        assert_eq!(widget["settings"]["title"], "Hi");
        assert!(widget["settings"].get("text").is_none());

        assert!(result.has_repair(RepairKind::ExtractedJson));
        assert!(result.has_repair(RepairKind::GeneratedId));
        assert!(result.has_repair(RepairKind::WrappedWidgetInSection));
        assert!(result.has_repair(RepairKind::FixedHeadingTitle));

        let report = SchemaValidator::new(false).validate(&data);
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_duplicate_id_gets_fresh_id() {
        let input = r#"{"elements":[{"id":"a1","elType":"section","elements":[{"id":"a1","elType":"column"}]}]}"#;
        let result = repair(input);
        let data = result.data.clone().unwrap();
        let column_id = data["elements"][0]["elements"][0]["id"].as_str().unwrap();
        assert_ne!(column_id, "a1");

        let entry = result
            .repairs
            .iter()
            .find(|e| e.kind == RepairKind::FixedDuplicateId)
            .unwrap();
        assert!(entry.message.contains("\"a1\""));
        assert_eq!(entry.path, "root.elements[0].elements[0]");

        assert!(SchemaValidator::new(false).validate(&data).valid);
    }

    #[test]
    fn test_prose_is_terminal_failure() {
        let result = repair("Sorry, I can't help with that layout.");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_scalar_tree_is_failure() {
        let result = JsonRepair::new().repair(&json!(12));
        assert!(!result.success);
    }

    #[test]
    fn test_bare_array_and_single_node_are_wrapped() {
        let result = repair(r#"[{"id":"s1","elType":"section"}]"#);
        assert_eq!(kinds(&result), vec![RepairKind::WrappedElements]);
        assert_eq!(result.data.unwrap()["elements"][0]["elements"], json!([]));

        let result = repair(r#"{"id":"w1","elType":"widget","widgetType":"divider","settings":{}}"#);
        assert_eq!(kinds(&result)[0], RepairKind::WrappedSingleElement);
        assert!(result.has_repair(RepairKind::WrappedWidgetInSection));
        assert_eq!(result.data.unwrap()["elements"][0]["elements"][0]["elements"][0]["id"], "w1");

        // 带 elements 数组的对象按根对象处理
        let result = repair(r#"{"id":"s1","elType":"section","elements":[]}"#);
        assert!(result.repairs.is_empty());
    }

    #[test]
    fn test_nested_elements_are_hoisted() {
        let input = json!({"layout": {"content": [1]}, "page": [{"elType": "section", "id": "s1"}]});
        let result = JsonRepair::new().repair(&input);
        assert!(result.has_repair(RepairKind::FoundNestedElements));
        let data = result.data.unwrap();
        assert_eq!(data["elements"][0]["id"], "s1");
    }

    #[test]
    fn test_unnormalizable_object_is_returned_as_is() {
        let input = json!({"message": "hello"});
        let result = JsonRepair::new().repair(&input);
        assert!(result.success);
        assert_eq!(result.data.unwrap(), input);
        assert!(result.repairs.is_empty());
    }

    #[test]
    fn test_kind_inference_from_cues_and_parent() {
        let input = json!({"elements": [{
            "id": "s1",
            "elements": [
                {"id": "c1", "settings": {"_column_size": 50}, "elements": [
                    {"id": "w1", "settings": {"editor": "<p>Hi</p>"}}
                ]},
                {"id": "c2"}
            ]
        }]});
        let result = JsonRepair::new().repair(&input);
        let data = result.data.unwrap();
        assert_eq!(data["elements"][0]["elType"], "section");
        assert_eq!(data["elements"][0]["elements"][0]["elType"], "column");
        assert_eq!(data["elements"][0]["elements"][1]["elType"], "column");
        let widget = &data["elements"][0]["elements"][0]["elements"][0];
        assert_eq!(widget["elType"], "widget");
        assert_eq!(widget["widgetType"], "text-editor");
    }

    #[test]
    fn test_kind_case_is_normalized() {
        let input = json!({"elements": [{"id": "s1", "elType": "Section", "elements": []}]});
        let result = JsonRepair::new().repair(&input);
        assert_eq!(kinds(&result), vec![RepairKind::NormalizedKind]);
        assert_eq!(result.data.unwrap()["elements"][0]["elType"], "section");
    }

    #[test]
    fn test_widget_under_section_is_wrapped_in_column() {
        let input = json!({"elements": [{"id": "s1", "elType": "section", "elements": [
            {"id": "w1", "elType": "widget", "widgetType": "divider"}
        ]}]});
        let result = JsonRepair::new().repair(&input);
        assert!(result.has_repair(RepairKind::WrappedWidgetInColumn));
        let data = result.data.unwrap();
        let column = &data["elements"][0]["elements"][0];
        assert_eq!(column["elType"], "column");
        assert_eq!(column["elements"][0]["id"], "w1");
    }

    #[test]
    fn test_column_at_root_is_wrapped_and_children_still_fixed() {
        let input = json!({"elements": [{"id": "c1", "elType": "column", "settings": {"_column_size": 100}, "elements": [
            {"id": "w1", "elType": "widget", "widgetType": "IMG", "settings": {"image": "https://example.com/x.png"}}
        ]}]});
        let result = JsonRepair::new().repair(&input);
        assert!(result.has_repair(RepairKind::WrappedColumnInSection));
        assert!(result.has_repair(RepairKind::MappedWidgetKind));
        assert!(result.has_repair(RepairKind::FixedImageStructure));

        let data = result.data.unwrap();
        let widget = &data["elements"][0]["elements"][0]["elements"][0];
        assert_eq!(widget["widgetType"], "image");
        assert_eq!(widget["settings"]["image"]["url"], "https://example.com/x.png");
    }

    #[test]
    fn test_widget_kind_case_normalization() {
        let input = json!({"elements": [{"id": "s1", "elType": "section", "elements": [
            {"id": "c1", "elType": "column", "settings": {"_column_size": 100}, "elements": [
                {"id": "w1", "elType": "widget", "widgetType": "Divider", "settings": {}}
            ]}
        ]}]});
        let result = JsonRepair::new().repair(&input);
        assert_eq!(kinds(&result), vec![RepairKind::NormalizedWidgetKind]);
    }

    #[test]
    fn test_settings_and_children_types() {
        let input = json!({"elements": [{"id": "s1", "elType": "section", "settings": "bad", "elements": "nope"}]});
        let result = JsonRepair::new().repair(&input);
        assert!(result.has_repair(RepairKind::FixedSettingsType));
        assert!(result.has_repair(RepairKind::FixedChildrenType));
        let data = result.data.unwrap();
        assert_eq!(data["elements"][0]["settings"], json!({}));
        assert_eq!(data["elements"][0]["elements"], json!([]));
    }

    #[test]
    fn test_non_object_nodes_are_dropped() {
        let input = json!({"elements": [42, {"id": "s1", "elType": "section", "elements": []}]});
        let result = JsonRepair::new().repair(&input);
        assert!(result.has_repair(RepairKind::DroppedNonObject));
        assert_eq!(result.data.unwrap()["elements"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_generated_ids_avoid_existing_ids() {
        let mut probe = IdGenerator::new(HashSet::new());
        let first = probe.next_id();

        let input = json!({"elements": [
            {"id": first, "elType": "section", "elements": []},
            {"elType": "section", "elements": []}
        ]});
        let result = JsonRepair::new().repair(&input);
        let data = result.data.unwrap();
        assert_eq!(data["elements"][0]["id"], first.as_str());
        assert_ne!(data["elements"][1]["id"], first.as_str());
    }

    #[test]
    fn test_generated_ids_are_deterministic() {
        let input = r#"{"elements":[{"elType":"section"},{"elType":"section"}]}"#;
        assert_eq!(repair(input), repair(input));
    }

    #[test]
    fn test_valid_document_is_untouched() {
        let input = json!({"elements": [{
            "id": "s1", "elType": "section", "settings": {},
            "elements": [{
                "id": "c1", "elType": "column", "settings": {"_column_size": 100},
                "elements": [
                    {"id": "w1", "elType": "widget", "widgetType": "heading",
                     "settings": {"title": "Hello", "header_size": "h1"}},
                    {"id": "w2", "elType": "widget", "widgetType": "button",
                     "settings": {"text": "Go", "link": {"url": "#", "is_external": false, "nofollow": false}}}
                ]
            }]
        }]});
        let result = JsonRepair::new().repair(&input);
        assert!(result.repairs.is_empty(), "{:?}", result.repairs);

        let original = Document::from_value(input).unwrap();
        let repaired = Document::from_value(result.data.unwrap()).unwrap();
        assert_eq!(original, repaired);
    }
}
