//! 提示词构建服务 - 业务能力层
//!
//! 只负责把用户目标和上下文拼成 system / prompt 文本，不关心发送和校验。

use std::fmt::Write as _;

use serde::Deserialize;

use crate::models::issue::Issue;
use crate::models::widget_catalog;

/// 一次请求的提示词
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptParts {
    pub system: String,
    pub prompt: String,
}

/// 品牌规范
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BrandGuidelines {
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub tone_keywords: Option<String>,
}

impl BrandGuidelines {
    fn is_empty(&self) -> bool {
        self.primary_color.is_none() && self.secondary_color.is_none() && self.tone_keywords.is_none()
    }
}

/// 知识库上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KnowledgeContext {
    pub summary: String,
    #[serde(default)]
    pub guidance: Option<String>,
}

/// 生成上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PromptContext {
    #[serde(default)]
    pub brand: Option<BrandGuidelines>,
    #[serde(default)]
    pub knowledge: Option<KnowledgeContext>,
}

impl PromptContext {
    pub fn with_knowledge(summary: impl Into<String>) -> Self {
        Self {
            brand: None,
            knowledge: Some(KnowledgeContext {
                summary: summary.into(),
                guidance: None,
            }),
        }
    }
}

/// 提示词构建器
pub trait PromptBuilder: Send + Sync {
    fn build_prompt(&self, goal: &str, context: &PromptContext) -> PromptParts;

    /// 上一次尝试失败后的重试提示词，逐条列出需要修正的问题
    fn build_retry_prompt(&self, goal: &str, issues: &[Issue]) -> PromptParts;
}

/// 默认的布局提示词构建器
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutPromptBuilder {
    extended_widgets: bool,
}

/// 部分 widget 的 settings 示例
const WIDGET_EXAMPLES: &[(&str, &str)] = &[
    ("heading", r#"{ "title": "Text", "header_size": "h1|h2|h3|h4|h5|h6", "align": "left|center|right" }"#),
    ("text-editor", r#"{ "editor": "<p>HTML content</p>" }"#),
    ("image", r#"{ "image": { "url": "https://...", "id": "" }, "align": "center" }"#),
    ("button", r##"{ "text": "Get Started", "link": { "url": "#", "is_external": false } }"##),
    ("icon", r#"{ "selected_icon": { "value": "fas fa-star", "library": "fa-solid" } }"#),
    ("icon-list", r#"{ "icon_list": [ { "text": "Item", "selected_icon": { "value": "fas fa-check", "library": "fa-solid" } } ] }"#),
    ("accordion", r#"{ "tabs": [ { "tab_title": "Question?", "tab_content": "Answer." } ] }"#),
    ("social-icons", r#"{ "social_icon_list": [ { "social_icon": { "value": "fab fa-facebook", "library": "fa-brands" } } ] }"#),
];

impl LayoutPromptBuilder {
    pub fn new(extended_widgets: bool) -> Self {
        Self { extended_widgets }
    }

    fn system_instruction(&self, context: &PromptContext) -> String {
        let mut system = String::from(
            "You are a page layout assistant. Generate layout JSON that can be imported directly by the renderer.\n\n",
        );
        system.push_str("## REQUIREMENTS\n\n");
        system.push_str("1. Output ONLY valid JSON, without markdown fences or explanations\n");
        system.push_str("2. Every element MUST have a unique 'id' of 7 alphanumeric characters\n");
        system.push_str("3. Follow the hierarchy: section > column > widget (or container > widget)\n");
        system.push_str("4. Use only widgetType values from the list below\n");
        system.push_str("5. Include the required settings for each widget type\n\n");
        system.push_str(&structure_reference());
        system.push_str(&self.widget_reference());

        if let Some(brand) = context.brand.as_ref().filter(|brand| !brand.is_empty()) {
            system.push_str(&brand_instruction(brand));
        }
        system
    }

    fn widget_reference(&self) -> String {
        let mut reference = String::from("## AVAILABLE WIDGETS\n\n");
        let widgets = widget_catalog::supported_widgets(self.extended_widgets);
        let _ = writeln!(reference, "{}\n", widgets.join(", "));

        reference.push_str("### Settings examples\n");
        for (kind, example) in WIDGET_EXAMPLES {
            let _ = writeln!(reference, "- **{}**: {}", kind, example);
        }
        reference.push('\n');
        reference
    }
}

fn structure_reference() -> String {
    let mut structure = String::from("## STRUCTURE\n\n");
    structure.push_str("The output is an object whose 'elements' array holds sections:\n\n");
    structure.push_str(
        r#"{"elements":[{"id":"abc1234","elType":"section","settings":{"structure":"20"},"elements":[{"id":"def5678","elType":"column","settings":{"_column_size":50},"elements":[{"id":"ghi9012","elType":"widget","widgetType":"heading","settings":{"title":"Your Heading","header_size":"h2"}}]}]}]}"#,
    );
    structure.push_str("\n\n");
    structure.push_str("- **section**: top-level, contains columns\n");
    structure.push_str("- **column**: inside sections, contains widgets; '_column_size' is the width percentage\n");
    structure.push_str("- **widget**: inside columns, must have 'widgetType'\n");
    structure.push_str("- **container**: flexbox alternative to section, may contain widgets directly\n\n");
    structure
}

fn brand_instruction(brand: &BrandGuidelines) -> String {
    let mut instruction = String::from("## BRAND GUIDELINES\n\n");
    if let Some(color) = &brand.primary_color {
        let _ = writeln!(instruction, "- Primary brand color: {} (buttons, accents, highlights)", color);
    }
    if let Some(color) = &brand.secondary_color {
        let _ = writeln!(instruction, "- Secondary color: {}", color);
    }
    if let Some(tone) = &brand.tone_keywords {
        let _ = writeln!(instruction, "- Brand voice: {}", tone);
        instruction.push_str("- Match this tone in headings, descriptions and button text\n");
    }
    instruction.push('\n');
    instruction
}

impl PromptBuilder for LayoutPromptBuilder {
    fn build_prompt(&self, goal: &str, context: &PromptContext) -> PromptParts {
        let mut prompt = goal.trim().to_string();

        if let Some(knowledge) = context
            .knowledge
            .as_ref()
            .filter(|knowledge| !knowledge.summary.trim().is_empty())
        {
            prompt.push_str("\n\n## CONTEXT\n");
            prompt.push_str(knowledge.summary.trim());
            if let Some(guidance) = &knowledge.guidance {
                prompt.push_str("\n\n");
                prompt.push_str(guidance.trim());
            }
        }

        prompt.push_str("\n\n## OUTPUT\n");
        prompt.push_str("- Output ONLY the JSON object, starting with { and ending with }\n");
        prompt.push_str("- Every element needs a unique 7-character alphanumeric 'id'\n");
        prompt.push_str("- Use realistic content instead of placeholder text\n");

        PromptParts {
            system: self.system_instruction(context),
            prompt,
        }
    }

    fn build_retry_prompt(&self, goal: &str, issues: &[Issue]) -> PromptParts {
        let mut system =
            String::from("You are fixing a failed layout generation. The previous attempt had errors.\n\n");
        system.push_str("## ERRORS TO FIX\n");
        for issue in issues {
            let _ = writeln!(system, "- {} (at {})", issue.message, issue.path);
        }
        system.push('\n');
        system.push_str(&structure_reference());

        let mut prompt = String::from("Regenerate valid layout JSON for this request:\n\n");
        prompt.push_str(goal.trim());
        prompt.push_str("\n\n## CRITICAL\n");
        prompt.push_str("- Fix every error listed above\n");
        prompt.push_str("- Output ONLY valid JSON\n");

        PromptParts { system, prompt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::IssueCode;

    #[test]
    fn test_extended_widgets_only_when_enabled() {
        let context = PromptContext::default();
        let base = LayoutPromptBuilder::new(false).build_prompt("Landing page", &context);
        assert!(base.system.contains("heading"));
        assert!(!base.system.contains("price-table"));

        let extended = LayoutPromptBuilder::new(true).build_prompt("Landing page", &context);
        assert!(extended.system.contains("price-table"));
    }

    #[test]
    fn test_widget_examples_are_valid_json() {
        for (kind, example) in WIDGET_EXAMPLES {
            let parsed: serde_json::Value = serde_json::from_str(example)
                .unwrap_or_else(|e| panic!("{} 示例不是合法 JSON: {}", kind, e));
            assert!(parsed.is_object());
        }

        let button = WIDGET_EXAMPLES.iter().find(|(kind, _)| *kind == "button").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(button.1).unwrap();
        assert_eq!(parsed["link"]["url"], "#");
    }

    #[test]
    fn test_brand_and_knowledge() {
        let context = PromptContext {
            brand: Some(BrandGuidelines {
                primary_color: Some("#ff6600".to_string()),
                secondary_color: None,
                tone_keywords: Some("playful".to_string()),
            }),
            knowledge: Some(KnowledgeContext {
                summary: "We sell bikes.".to_string(),
                guidance: Some("Mention free shipping.".to_string()),
            }),
        };
        let parts = LayoutPromptBuilder::default().build_prompt("Shop page", &context);
        assert!(parts.system.contains("#ff6600"));
        assert!(parts.system.contains("playful"));
        assert!(parts.prompt.starts_with("Shop page"));
        assert!(parts.prompt.contains("We sell bikes."));
        assert!(parts.prompt.contains("Mention free shipping."));
    }

    #[test]
    fn test_empty_brand_is_skipped() {
        let context = PromptContext {
            brand: Some(BrandGuidelines::default()),
            knowledge: None,
        };
        let parts = LayoutPromptBuilder::default().build_prompt("Page", &context);
        assert!(!parts.system.contains("BRAND GUIDELINES"));
    }

    #[test]
    fn test_retry_prompt_lists_issues() {
        let issues = vec![
            Issue::new(IssueCode::MissingId, "Element is missing an id.", "root.elements[0]"),
            Issue::new(IssueCode::DuplicateId, "Duplicate id \"a1\".", "root.elements[1]"),
        ];
        let parts = LayoutPromptBuilder::default().build_retry_prompt("Hero", &issues);
        assert!(parts.system.contains("- Element is missing an id. (at root.elements[0])"));
        assert!(parts.system.contains("- Duplicate id \"a1\". (at root.elements[1])"));
        assert!(parts.prompt.contains("Hero"));
    }
}
