//! Widget 目录
//!
//! 以 widget 名为键的静态查找表，每项给出：
//! - 所属分级（基础 / 扩展，扩展 widget 需要外部能力开关）
//! - 必填字段检查（缺失只产生警告）
//! - settings 纠正函数（修复引擎使用）
//!
//! 目录是开放的：不在表中的 widget 视为第三方 widget，只产生警告。

use phf::phf_map;
use serde_json::{json, Map, Value as JsonValue};

use crate::models::issue::{IssueCode, RepairKind};

/// 图片地址缺失时使用的占位图
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/800x600";

/// 按钮文字缺失时的默认值
pub const DEFAULT_BUTTON_TEXT: &str = "Click Here";

/// 标题缺失字号时的默认值
pub const DEFAULT_HEADER_SIZE: &str = "h2";

/// 列宽设置键（百分比）
pub const COLUMN_SIZE_KEY: &str = "_column_size";

/// 满宽列
pub const FULL_COLUMN_SIZE: u64 = 100;

type Settings = Map<String, JsonValue>;

/// 必填字段检查：返回 None 表示通过
pub type RequiredCheck = fn(&Settings) -> Option<(IssueCode, &'static str)>;

/// settings 纠正：返回实际执行的修改
pub type SettingsCoercer = fn(&mut Settings) -> Vec<(RepairKind, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetTier {
    Base,
    Extended,
}

#[derive(Clone, Copy)]
pub struct WidgetSpec {
    pub tier: WidgetTier,
    pub check: Option<RequiredCheck>,
    pub coerce: Option<SettingsCoercer>,
}

const BASE: WidgetSpec = WidgetSpec {
    tier: WidgetTier::Base,
    check: None,
    coerce: None,
};

const EXTENDED: WidgetSpec = WidgetSpec {
    tier: WidgetTier::Extended,
    check: None,
    coerce: None,
};

/// 基础 widget（按提示词中的展示顺序）
pub const BASE_WIDGETS: &[&str] = &[
    "heading",
    "text-editor",
    "image",
    "video",
    "button",
    "divider",
    "spacer",
    "google_maps",
    "icon",
    "image-box",
    "icon-box",
    "star-rating",
    "icon-list",
    "counter",
    "progress",
    "testimonial",
    "tabs",
    "accordion",
    "toggle",
    "social-icons",
    "alert",
    "audio",
    "shortcode",
    "html",
    "menu-anchor",
    "sidebar",
    "read-more",
    "image-carousel",
    "basic-gallery",
];

/// 扩展 widget
pub const EXTENDED_WIDGETS: &[&str] = &[
    "form",
    "posts",
    "portfolio",
    "slides",
    "nav-menu",
    "animated-headline",
    "price-list",
    "price-table",
    "flip-box",
    "call-to-action",
    "media-carousel",
    "testimonial-carousel",
    "reviews",
    "table-of-contents",
    "countdown",
    "share-buttons",
    "blockquote",
    "facebook-button",
    "facebook-comments",
    "facebook-embed",
    "facebook-page",
    "template",
    "global",
    "gallery",
    "lottie",
    "hotspot",
    "code-highlight",
    "video-playlist",
    "loop-grid",
    "loop-carousel",
];

static CATALOG: phf::Map<&'static str, WidgetSpec> = phf_map! {
    "heading" => WidgetSpec { tier: WidgetTier::Base, check: Some(check_heading), coerce: Some(coerce_heading) },
    "text-editor" => WidgetSpec { tier: WidgetTier::Base, check: Some(check_text_editor), coerce: Some(coerce_text_editor) },
    "image" => WidgetSpec { tier: WidgetTier::Base, check: Some(check_image), coerce: Some(coerce_image) },
    "video" => BASE,
    "button" => WidgetSpec { tier: WidgetTier::Base, check: Some(check_button), coerce: Some(coerce_button) },
    "divider" => BASE,
    "spacer" => BASE,
    "google_maps" => BASE,
    "icon" => WidgetSpec { tier: WidgetTier::Base, check: Some(check_icon), coerce: Some(coerce_icon) },
    "image-box" => BASE,
    "icon-box" => WidgetSpec { tier: WidgetTier::Base, check: Some(check_icon), coerce: Some(coerce_icon) },
    "star-rating" => BASE,
    "icon-list" => BASE,
    "counter" => BASE,
    "progress" => BASE,
    "testimonial" => BASE,
    "tabs" => BASE,
    "accordion" => BASE,
    "toggle" => BASE,
    "social-icons" => WidgetSpec { tier: WidgetTier::Base, check: None, coerce: Some(coerce_social_icons) },
    "alert" => BASE,
    "audio" => BASE,
    "shortcode" => BASE,
    "html" => BASE,
    "menu-anchor" => BASE,
    "sidebar" => BASE,
    "read-more" => BASE,
    "image-carousel" => BASE,
    "basic-gallery" => BASE,

    "form" => EXTENDED,
    "posts" => EXTENDED,
    "portfolio" => EXTENDED,
    "slides" => EXTENDED,
    "nav-menu" => EXTENDED,
    "animated-headline" => EXTENDED,
    "price-list" => EXTENDED,
    "price-table" => EXTENDED,
    "flip-box" => EXTENDED,
    "call-to-action" => EXTENDED,
    "media-carousel" => EXTENDED,
    "testimonial-carousel" => EXTENDED,
    "reviews" => EXTENDED,
    "table-of-contents" => EXTENDED,
    "countdown" => EXTENDED,
    "share-buttons" => EXTENDED,
    "blockquote" => EXTENDED,
    "facebook-button" => EXTENDED,
    "facebook-comments" => EXTENDED,
    "facebook-embed" => EXTENDED,
    "facebook-page" => EXTENDED,
    "template" => EXTENDED,
    "global" => EXTENDED,
    "gallery" => EXTENDED,
    "lottie" => EXTENDED,
    "hotspot" => EXTENDED,
    "code-highlight" => EXTENDED,
    "video-playlist" => EXTENDED,
    "loop-grid" => EXTENDED,
    "loop-carousel" => EXTENDED,
};

/// 模型常用的错误 widget 名 → 标准名（键均为小写）
static SYNONYMS: phf::Map<&'static str, &'static str> = phf_map! {
    "text" => "text-editor",
    "paragraph" => "text-editor",
    "content" => "text-editor",
    "title" => "heading",
    "h1" => "heading",
    "h2" => "heading",
    "h3" => "heading",
    "header" => "heading",
    "img" => "image",
    "picture" => "image",
    "photo" => "image",
    "btn" => "button",
    "cta" => "button",
    "link" => "button",
    "separator" => "divider",
    "hr" => "divider",
    "gap" => "spacer",
    "space" => "spacer",
    "map" => "google_maps",
    "maps" => "google_maps",
    "google-maps" => "google_maps",
    "googlemap" => "google_maps",
    "list" => "icon-list",
    "bullet-list" => "icon-list",
    "checklist" => "icon-list",
    "features" => "icon-box",
    "feature" => "icon-box",
    "service" => "icon-box",
    "card" => "image-box",
    "review" => "testimonial",
    "quote" => "testimonial",
    "faq" => "accordion",
    "questions" => "accordion",
    "collapsible" => "accordion",
    "tab" => "tabs",
    "tabbed" => "tabs",
    "social" => "social-icons",
    "social-links" => "social-icons",
    "follow" => "social-icons",
    "rating" => "star-rating",
    "stars" => "star-rating",
    "number" => "counter",
    "stat" => "counter",
    "statistic" => "counter",
    "progress-bar" => "progress",
    "percentage" => "progress",
    "warning" => "alert",
    "notice" => "alert",
    "info" => "alert",
    "youtube" => "video",
    "vimeo" => "video",
    "embed" => "video",
};

pub fn lookup(widget_kind: &str) -> Option<&'static WidgetSpec> {
    CATALOG.get(widget_kind)
}

pub fn is_known_widget(widget_kind: &str) -> bool {
    CATALOG.contains_key(widget_kind)
}

pub fn requires_extended(widget_kind: &str) -> bool {
    matches!(lookup(widget_kind), Some(spec) if spec.tier == WidgetTier::Extended)
}

/// 支持的 widget 列表（基础在前）
pub fn supported_widgets(include_extended: bool) -> Vec<&'static str> {
    let mut widgets = BASE_WIDGETS.to_vec();
    if include_extended {
        widgets.extend_from_slice(EXTENDED_WIDGETS);
    }
    widgets
}

/// 同义词查找，大小写不敏感
pub fn canonical_synonym(name: &str) -> Option<&'static str> {
    SYNONYMS.get(name.to_lowercase().as_str()).copied()
}

/// 根据 settings 形状推断 widget 类型，兜底为文本块
pub fn infer_widget_kind(settings: Option<&Settings>) -> &'static str {
    let Some(settings) = settings else {
        return "text-editor";
    };
    let has = |key: &str| settings.contains_key(key);

    if has("title") && !has("editor") {
        "heading"
    } else if has("editor") {
        "text-editor"
    } else if has("image") || has("image_url") {
        "image"
    } else if has("text") && has("link") {
        "button"
    } else if has("selected_icon") || has("icon") {
        "icon"
    } else {
        "text-editor"
    }
}

// ========== 必填字段检查 ==========

fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn check_heading(settings: &Settings) -> Option<(IssueCode, &'static str)> {
    is_blank(settings.get("title"))
        .then_some((IssueCode::HeadingNoTitle, "Heading widget has no title content."))
}

fn check_text_editor(settings: &Settings) -> Option<(IssueCode, &'static str)> {
    is_blank(settings.get("editor")).then_some((
        IssueCode::TextEditorNoContent,
        "Text Editor widget has no content.",
    ))
}

fn check_image(settings: &Settings) -> Option<(IssueCode, &'static str)> {
    let has_url = settings
        .get("image")
        .and_then(|image| image.get("url"))
        .is_some();
    (!has_url).then_some((IssueCode::ImageNoUrl, "Image widget has no image URL."))
}

fn check_button(settings: &Settings) -> Option<(IssueCode, &'static str)> {
    is_blank(settings.get("text")).then_some((IssueCode::ButtonNoText, "Button widget has no text."))
}

fn check_icon(settings: &Settings) -> Option<(IssueCode, &'static str)> {
    (!settings.contains_key("selected_icon") && !settings.contains_key("icon"))
        .then_some((IssueCode::IconNotSet, "Icon widget has no icon selected."))
}

// ========== settings 纠正 ==========

/// 取出第一个存在的字段
fn take_first(settings: &mut Settings, keys: &[&str]) -> Option<(String, JsonValue)> {
    let key = keys.iter().find(|key| settings.contains_key(**key))?;
    settings
        .remove(*key)
        .map(|value| (key.to_string(), value))
}

fn coerce_heading(settings: &mut Settings) -> Vec<(RepairKind, String)> {
    let mut fixes = Vec::new();

    if !settings.contains_key("title") {
        if let Some((from, value)) = take_first(settings, &["text", "content"]) {
            settings.insert("title".to_string(), value);
            fixes.push((
                RepairKind::FixedHeadingTitle,
                format!("Moved \"{}\" to \"title\" for heading widget.", from),
            ));
        }
    }

    if !settings.contains_key("header_size") {
        settings.insert("header_size".to_string(), json!(DEFAULT_HEADER_SIZE));
    }

    fixes
}

fn coerce_text_editor(settings: &mut Settings) -> Vec<(RepairKind, String)> {
    if settings.contains_key("editor") {
        return Vec::new();
    }

    match take_first(settings, &["text", "content"]) {
        Some((from, value)) => {
            settings.insert("editor".to_string(), value);
            vec![(
                RepairKind::FixedTextEditor,
                format!("Moved \"{}\" to \"editor\" field for text-editor widget.", from),
            )]
        }
        None => Vec::new(),
    }
}

fn coerce_image(settings: &mut Settings) -> Vec<(RepairKind, String)> {
    if matches!(settings.get("image"), Some(JsonValue::Object(_))) {
        return Vec::new();
    }

    let mut url = String::new();
    for key in ["image", "image_url", "url", "src"] {
        if let Some(JsonValue::String(candidate)) = settings.get(key) {
            if !candidate.trim().is_empty() {
                url = candidate.trim().to_string();
                if key != "image" {
                    settings.remove(key);
                }
                break;
            }
        }
    }

    let message = if url.is_empty() {
        url = PLACEHOLDER_IMAGE_URL.to_string();
        "Fixed image settings structure with a placeholder URL."
    } else {
        "Fixed image settings structure."
    };

    settings.insert("image".to_string(), json!({ "url": url, "id": "" }));
    vec![(RepairKind::FixedImageStructure, message.to_string())]
}

fn coerce_button(settings: &mut Settings) -> Vec<(RepairKind, String)> {
    let mut fixes = Vec::new();

    if !settings.contains_key("text") {
        let message = match take_first(settings, &["label", "title"]) {
            Some((from, value)) => {
                settings.insert("text".to_string(), value);
                format!("Moved \"{}\" to \"text\" for button widget.", from)
            }
            None => {
                settings.insert("text".to_string(), json!(DEFAULT_BUTTON_TEXT));
                format!("Defaulted button text to \"{}\".", DEFAULT_BUTTON_TEXT)
            }
        };
        fixes.push((RepairKind::FixedButtonText, message));
    }

    if let Some(JsonValue::String(url)) = settings.get("link") {
        let link = json!({ "url": url, "is_external": false, "nofollow": false });
        settings.insert("link".to_string(), link);
        fixes.push((
            RepairKind::FixedButtonLink,
            "Fixed button link structure.".to_string(),
        ));
    }

    fixes
}

/// 根据图标 class 前缀选择图标库
pub fn icon_library(icon_class: &str) -> &'static str {
    if icon_class.starts_with("fab ") || icon_class.contains("fa-brands") {
        "fa-brands"
    } else {
        "fa-solid"
    }
}

fn coerce_icon(settings: &mut Settings) -> Vec<(RepairKind, String)> {
    if settings.contains_key("selected_icon") {
        return Vec::new();
    }
    let Some(JsonValue::String(icon)) = settings.get("icon").cloned() else {
        return Vec::new();
    };

    settings.remove("icon");
    settings.insert(
        "selected_icon".to_string(),
        json!({ "value": icon, "library": icon_library(&icon) }),
    );
    vec![(
        RepairKind::FixedIconStructure,
        "Fixed icon settings structure.".to_string(),
    )]
}

fn coerce_social_icons(settings: &mut Settings) -> Vec<(RepairKind, String)> {
    let Some(JsonValue::Array(items)) = settings.get_mut("social_icon_list") else {
        return Vec::new();
    };

    let mut converted = 0;
    for item in items.iter_mut() {
        let Some(item) = item.as_object_mut() else {
            continue;
        };
        if let Some(JsonValue::String(network)) = item.get("social").cloned() {
            item.remove("social");
            item.insert(
                "social_icon".to_string(),
                json!({
                    "value": format!("fab fa-{}", network.trim().to_lowercase()),
                    "library": "fa-brands",
                }),
            );
            converted += 1;
        }
    }

    if converted == 0 {
        return Vec::new();
    }
    vec![(
        RepairKind::FixedSocialIcons,
        format!("Converted {} social network name(s) into icon descriptors.", converted),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(value: JsonValue) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_ordered_lists_match_table() {
        for name in BASE_WIDGETS {
            assert_eq!(lookup(name).map(|spec| spec.tier), Some(WidgetTier::Base), "{}", name);
        }
        for name in EXTENDED_WIDGETS {
            assert!(requires_extended(name), "{}", name);
        }
        assert_eq!(CATALOG.len(), BASE_WIDGETS.len() + EXTENDED_WIDGETS.len());
    }

    #[test]
    fn test_synonyms_are_case_insensitive_and_canonical() {
        assert_eq!(canonical_synonym("IMG"), Some("image"));
        assert_eq!(canonical_synonym("Cta"), Some("button"));
        assert_eq!(canonical_synonym("faq"), Some("accordion"));
        assert_eq!(canonical_synonym("heading"), None);
        for (_, target) in SYNONYMS.entries() {
            assert!(is_known_widget(target), "{}", target);
        }
    }

    #[test]
    fn test_infer_widget_kind_from_settings() {
        assert_eq!(infer_widget_kind(Some(&settings(json!({"title": "x"})))), "heading");
        assert_eq!(
            infer_widget_kind(Some(&settings(json!({"title": "x", "editor": "y"})))),
            "text-editor"
        );
        assert_eq!(
            infer_widget_kind(Some(&settings(json!({"text": "Go", "link": "#"})))),
            "button"
        );
        assert_eq!(infer_widget_kind(Some(&settings(json!({"icon": "fas fa-star"})))), "icon");
        assert_eq!(infer_widget_kind(None), "text-editor");
    }

    #[test]
    fn test_heading_moves_text_and_defaults_size() {
        let mut s = settings(json!({"text": "Hi"}));
        let fixes = coerce_heading(&mut s);
        assert_eq!(s["title"], "Hi");
        assert!(!s.contains_key("text"));
        assert_eq!(s["header_size"], "h2");
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].0, RepairKind::FixedHeadingTitle);

        // 只补默认字号不记录修复
        let mut s = settings(json!({"title": "Hi"}));
        assert!(coerce_heading(&mut s).is_empty());
        assert_eq!(s["header_size"], "h2");
    }

    #[test]
    fn test_image_bare_url_and_placeholder() {
        let mut s = settings(json!({"image": "https://example.com/a.png"}));
        coerce_image(&mut s);
        assert_eq!(s["image"], json!({"url": "https://example.com/a.png", "id": ""}));

        let mut s = settings(json!({"image": ""}));
        coerce_image(&mut s);
        assert_eq!(s["image"]["url"], PLACEHOLDER_IMAGE_URL);

        let mut s = settings(json!({"src": "https://example.com/b.png"}));
        coerce_image(&mut s);
        assert_eq!(s["image"]["url"], "https://example.com/b.png");
        assert!(!s.contains_key("src"));
    }

    #[test]
    fn test_button_text_and_link() {
        let mut s = settings(json!({"label": "Buy", "link": "https://shop.example"}));
        let fixes = coerce_button(&mut s);
        assert_eq!(s["text"], "Buy");
        assert_eq!(s["link"]["url"], "https://shop.example");
        assert_eq!(s["link"]["is_external"], false);
        assert_eq!(fixes.len(), 2);

        let mut s = settings(json!({}));
        coerce_button(&mut s);
        assert_eq!(s["text"], DEFAULT_BUTTON_TEXT);
    }

    #[test]
    fn test_icon_descriptor_library() {
        let mut s = settings(json!({"icon": "fab fa-github"}));
        coerce_icon(&mut s);
        assert_eq!(s["selected_icon"], json!({"value": "fab fa-github", "library": "fa-brands"}));
        assert_eq!(icon_library("fas fa-star"), "fa-solid");
        assert_eq!(icon_library("far fa-heart"), "fa-solid");
    }

    #[test]
    fn test_social_icon_names() {
        let mut s = settings(json!({"social_icon_list": [{"social": "Twitter"}, {"social_icon": {}}]}));
        let fixes = coerce_social_icons(&mut s);
        assert_eq!(fixes.len(), 1);
        assert_eq!(s["social_icon_list"][0]["social_icon"]["value"], "fab fa-twitter");
    }

    #[test]
    fn test_required_checks() {
        assert!(check_heading(&settings(json!({"title": "  "}))).is_some());
        assert!(check_heading(&settings(json!({"title": "Hello"}))).is_none());
        assert!(check_image(&settings(json!({"image": {"id": ""}}))).is_some());
        assert!(check_icon(&settings(json!({"icon": "x"}))).is_none());
    }
}
