//! 从模型输出文本中提取 JSON
//!
//! 依次尝试：直接解析 → 代码块 / 花括号 / 方括号提取 → 语法修补后再解析。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::models::issue::RepairKind;

const CANDIDATE_PATTERNS: [&str; 4] = [
    r"(?i)```json\s*\n?([\s\S]*?)\n?```",
    r"```\s*\n?([\s\S]*?)\n?```",
    r"\{[\s\S]*\}",
    r"\[[\s\S]*\]",
];

fn candidate_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        CANDIDATE_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// 提取结果：解析出的树 + 实际使用的修复手段
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: JsonValue,
    pub fixes: Vec<RepairKind>,
}

/// 只接受对象或数组
fn parse_container(text: &str) -> Option<JsonValue> {
    match serde_json::from_str::<JsonValue>(text.trim()) {
        Ok(value) if value.is_object() || value.is_array() => Some(value),
        _ => None,
    }
}

/// 从任意文本中提取 JSON 对象或数组，全部失败时返回 None
pub fn extract_json(input: &str) -> Option<Extracted> {
    if let Some(value) = parse_container(input) {
        return Some(Extracted {
            value,
            fixes: Vec::new(),
        });
    }

    let candidates: Vec<&str> = candidate_patterns()
        .iter()
        .filter_map(|pattern| pattern.captures(input))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str().trim())
        .collect();

    for candidate in &candidates {
        if let Some(value) = parse_container(candidate) {
            return Some(Extracted {
                value,
                fixes: vec![RepairKind::ExtractedJson],
            });
        }
        if let Some(value) = parse_container(&patch_json_syntax(candidate)) {
            return Some(Extracted {
                value,
                fixes: vec![RepairKind::ExtractedJson, RepairKind::FixedJsonSyntax],
            });
        }
    }

    parse_container(&patch_json_syntax(input)).map(|value| Extracted {
        value,
        fixes: vec![RepairKind::FixedJsonSyntax],
    })
}

/// 修补常见的 JSON 语法问题
///
/// - 去掉 BOM
/// - 删除 `}` / `]` 前的多余逗号
/// - 给 `{` 或 `,` 之后的裸键名加引号
/// - 单引号字符串改为双引号（已在双引号字符串中的内容不动）
pub fn patch_json_syntax(input: &str) -> String {
    let chars: Vec<char> = input.trim_start_matches('\u{feff}').chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < len {
        let c = chars[i];
        match c {
            '"' => {
                out.push(c);
                i += 1;
                while i < len {
                    let d = chars[i];
                    out.push(d);
                    i += 1;
                    if d == '\\' {
                        if i < len {
                            out.push(chars[i]);
                            i += 1;
                        }
                    } else if d == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < len {
                    let d = chars[i];
                    i += 1;
                    match d {
                        '\\' if i < len => {
                            let escaped = chars[i];
                            i += 1;
                            if escaped == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(escaped);
                            }
                        }
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        _ => out.push(d),
                    }
                }
                out.push('"');
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            c if (c.is_ascii_alphabetic() || c == '_') && after_key_opener(&out) => {
                let start = i;
                while i < len && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|ch| !ch.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn after_key_opener(out: &str) -> bool {
    matches!(
        out.chars().rev().find(|ch| !ch.is_whitespace()),
        Some('{') | Some(',')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse_has_no_fixes() {
        let extracted = extract_json(r#"  {"elements": []}  "#).unwrap();
        assert!(extracted.fixes.is_empty());
    }

    #[test]
    fn test_scalars_are_not_documents() {
        assert!(extract_json("42").is_none());
        assert!(extract_json("\"just a string\"").is_none());
    }

    #[test]
    fn test_fenced_block() {
        let input = "Here you go:\n```JSON\n{\"elements\": [1]}\n```\nEnjoy!";
        let extracted = extract_json(input).unwrap();
        assert_eq!(extracted.value, json!({"elements": [1]}));
        assert_eq!(extracted.fixes, vec![RepairKind::ExtractedJson]);
    }

    #[test]
    fn test_outer_braces_in_prose() {
        let input = "Sure! {\"elements\": []} Let me know if you need changes.";
        let extracted = extract_json(input).unwrap();
        assert_eq!(extracted.value, json!({"elements": []}));
    }

    #[test]
    fn test_syntax_patch() {
        let patched = patch_json_syntax("{elements: [{'id': 'a1', elType: 'section',},],}");
        assert_eq!(
            serde_json::from_str::<JsonValue>(&patched).unwrap(),
            json!({"elements": [{"id": "a1", "elType": "section"}]})
        );
    }

    #[test]
    fn test_patch_leaves_quoted_content_alone() {
        let patched = patch_json_syntax(r#"{"title": "it's {a, b,} here", 'q': 'say "hi"'}"#);
        let value: JsonValue = serde_json::from_str(&patched).unwrap();
        assert_eq!(value["title"], "it's {a, b,} here");
        assert_eq!(value["q"], "say \"hi\"");
    }

    #[test]
    fn test_patch_inside_fence() {
        let input = "```json\n{\"elements\": [{\"id\": \"a1\",},]}\n```";
        let extracted = extract_json(input).unwrap();
        assert_eq!(
            extracted.fixes,
            vec![RepairKind::ExtractedJson, RepairKind::FixedJsonSyntax]
        );
    }

    #[test]
    fn test_bom_and_bare_keys_on_raw_input() {
        let extracted = extract_json("\u{feff}{elements: []}").unwrap();
        assert_eq!(extracted.value, json!({"elements": []}));
        assert!(extracted.fixes.contains(&RepairKind::FixedJsonSyntax));
    }

    #[test]
    fn test_prose_fails() {
        assert!(extract_json("I could not produce a layout for this request.").is_none());
    }
}
