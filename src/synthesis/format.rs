//! Presentation format detection, reformatting and schema inference.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// How a synthesized output should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Text,
    Code,
    Structured,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Code => write!(f, "code"),
            OutputFormat::Structured => write!(f, "structured"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Spaces per nesting level when reindenting code.
    pub indent_size: usize,
    /// Wrap column for text output; 0 disables wrapping.
    pub max_line_length: usize,
    /// Attach result metadata to formatted output.
    pub include_metadata: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            max_line_length: 80,
            include_metadata: true,
        }
    }
}

/// Keywords and punctuation that mark a string as code, matched anywhere.
fn code_tokens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"function|class|import|export|const|let|var|[{};]")
            .unwrap_or_else(|e| panic!("invalid code token pattern: {}", e))
    })
}

/// Whether `text` contains any code-like token.
pub fn looks_like_code(text: &str) -> bool {
    code_tokens().is_match(text)
}

/// Whether an object or array holds another object or array.
pub fn is_nested(value: &Value) -> bool {
    let container = |v: &Value| v.is_object() || v.is_array();
    match value {
        Value::Object(map) => map.values().any(container),
        Value::Array(items) => items.iter().any(container),
        _ => false,
    }
}

pub fn detect_format(value: &Value) -> OutputFormat {
    match value {
        Value::String(s) if looks_like_code(s) => OutputFormat::Code,
        Value::String(_) => OutputFormat::Text,
        Value::Object(_) | Value::Array(_) if is_nested(value) => OutputFormat::Structured,
        Value::Object(_) | Value::Array(_) => OutputFormat::Json,
        _ => OutputFormat::Text,
    }
}

/// Reindent code by bracket depth.
///
/// A line opening with a closing bracket dedents before it is printed; a
/// line ending with an opening bracket indents the lines after it. A trailing
/// newline is kept.
pub fn indent_code(code: &str, indent_size: usize) -> String {
    let unit = " ".repeat(indent_size);
    let mut depth = 0usize;
    let mut lines = Vec::new();

    for line in code.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            lines.push(String::new());
            continue;
        }
        if trimmed.starts_with(|c: char| matches!(c, '}' | ']' | ')')) {
            depth = depth.saturating_sub(1);
        }
        lines.push(format!("{}{}", unit.repeat(depth), trimmed));
        if trimmed.ends_with(|c: char| matches!(c, '{' | '[' | '(')) {
            depth += 1;
        }
    }

    let mut out = lines.join("\n");
    if code.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Greedy word wrap that keeps existing line breaks and a trailing newline.
///
/// Lines that already fit are left untouched. A line that needs wrapping is
/// re-flowed word by word, so its indentation and runs of spaces collapse to
/// single spaces.
pub fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut out = text
        .lines()
        .map(|line| {
            if line.chars().count() <= width {
                return line.to_string();
            }
            let mut wrapped = Vec::new();
            let mut current = String::new();
            for word in line.split_whitespace() {
                if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                    wrapped.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            if !current.is_empty() {
                wrapped.push(current);
            }
            wrapped.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Infer a structural schema. Arrays are described by their first element.
pub fn infer_schema(value: &Value) -> Value {
    match value {
        Value::Array(items) => json!({
            "type": "array",
            "items": items.first().map(infer_schema).unwrap_or_else(|| json!({})),
        }),
        Value::Object(map) => {
            let properties: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), infer_schema(v)))
                .collect();
            json!({ "type": "object", "properties": properties })
        }
        scalar => json!({ "type": type_name(scalar) }),
    }
}
