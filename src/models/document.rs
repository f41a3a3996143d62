//! 布局文档模型
//!
//! 渲染器认可的线上格式固定为 `{ "elements": [Node, ...] }`，
//! 其中 `Node = {id, elType, settings, elements?, widgetType?}`。
//! 内部字段名（`kind` / `children` / `widget_kind`）与序列化键不同，
//! 由 serde 重命名保证兼容。

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

/// 节点类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Section,
    Column,
    Widget,
    Container,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Section,
        NodeKind::Column,
        NodeKind::Widget,
        NodeKind::Container,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Section => "section",
            NodeKind::Column => "column",
            NodeKind::Widget => "widget",
            NodeKind::Container => "container",
        }
    }

    /// 精确解析（区分大小写）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "section" => Some(NodeKind::Section),
            "column" => Some(NodeKind::Column),
            "widget" => Some(NodeKind::Widget),
            "container" => Some(NodeKind::Container),
            _ => None,
        }
    }

    /// 子节点类型是否符合常规层级（软约束，违反只产生警告）
    pub fn accepts_child(parent: ParentKind, child: NodeKind) -> bool {
        match parent {
            ParentKind::Root => matches!(child, NodeKind::Section | NodeKind::Container),
            ParentKind::Node(NodeKind::Section) => child == NodeKind::Column,
            ParentKind::Node(NodeKind::Column) => matches!(
                child,
                NodeKind::Widget | NodeKind::Section | NodeKind::Container
            ),
            ParentKind::Node(NodeKind::Container) => {
                matches!(child, NodeKind::Widget | NodeKind::Container)
            }
            ParentKind::Node(NodeKind::Widget) | ParentKind::Unknown => true,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 遍历时的父节点上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Root,
    Node(NodeKind),
    /// 父节点类型缺失或非法，跳过层级检查
    Unknown,
}

impl ParentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParentKind::Root => "root",
            ParentKind::Node(kind) => kind.as_str(),
            ParentKind::Unknown => "unknown",
        }
    }
}

/// 布局树中的一个节点
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    pub id: String,

    #[serde(rename = "elType")]
    pub kind: NodeKind,

    #[serde(default)]
    pub settings: Map<String, JsonValue>,

    #[serde(rename = "elements", default)]
    pub children: Vec<Node>,

    #[serde(rename = "widgetType", default)]
    pub widget_kind: Option<String>,

    /// 渲染器可能需要的其他字段（如 `isInner`），原样保留
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            settings: Map::new(),
            children: Vec::new(),
            widget_kind: None,
            extra: Map::new(),
        }
    }

    pub fn widget(id: impl Into<String>, widget_kind: impl Into<String>) -> Self {
        Self {
            widget_kind: Some(widget_kind.into()),
            ..Self::new(id, NodeKind::Widget)
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// 深度优先、从左到右遍历自身及所有后代
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("elType", &self.kind)?;
        map.serialize_entry("settings", &self.settings)?;
        // 非 widget 节点始终输出 elements，下游无需判空
        if self.kind != NodeKind::Widget || !self.children.is_empty() {
            map.serialize_entry("elements", &self.children)?;
        }
        if let Some(widget_kind) = &self.widget_kind {
            map.serialize_entry("widgetType", widget_kind)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// 结构计数（用于变体摘要）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralCounts {
    pub sections: usize,
    pub columns: usize,
    pub widgets: usize,
}

impl StructuralCounts {
    /// 渲染为 "2 sections • 3 columns • 5 widgets"，计数为 0 的部分省略
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        for (count, singular, plural) in [
            (self.sections, "section", "sections"),
            (self.columns, "column", "columns"),
            (self.widgets, "widget", "widgets"),
        ] {
            if count > 0 {
                let noun = if count == 1 { singular } else { plural };
                parts.push(format!("{} {}", count, noun));
            }
        }

        if parts.is_empty() {
            "Layout variation".to_string()
        } else {
            parts.join(" • ")
        }
    }
}

/// 根文档
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub elements: Vec<Node>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Document {
    pub fn new(elements: Vec<Node>) -> Self {
        Self {
            elements,
            extra: Map::new(),
        }
    }

    /// 从已通过校验的 JSON 值构造文档
    ///
    /// 接受三种形状：`{elements: [...]}`、裸节点数组、单个节点对象。
    pub fn from_value(value: JsonValue) -> Result<Self, serde_json::Error> {
        match value {
            JsonValue::Array(items) => Ok(Self::new(serde_json::from_value(JsonValue::Array(
                items,
            ))?)),
            JsonValue::Object(map) if !map.contains_key("elements") && map.contains_key("elType") => {
                let node: Node = serde_json::from_value(JsonValue::Object(map))?;
                Ok(Self::new(vec![node]))
            }
            other => serde_json::from_value(other),
        }
    }

    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Node)) {
        for node in &self.elements {
            node.walk(&mut visit);
        }
    }

    /// 深度优先顺序下的全部 id
    pub fn all_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.walk(|node| ids.push(node.id.as_str()));
        ids
    }

    pub fn structural_counts(&self) -> StructuralCounts {
        let mut counts = StructuralCounts::default();
        self.walk(|node| match node.kind {
            NodeKind::Section => counts.sections += 1,
            NodeKind::Column => counts.columns += 1,
            NodeKind::Widget => counts.widgets += 1,
            NodeKind::Container => {}
        });
        counts
    }
}
