//! Response sanitizer
//!
//! Models wrap their JSON in markdown fences, chatty preambles, comments and
//! trailing commas. [`extract_structured`] runs an ordered list of pure
//! extraction strategies over the raw text, cleans each candidate and keeps
//! the first one that parses as a JSON object. [`normalize_output`] then turns
//! that object into a typed [`AgentOutput`].

use crate::error::ParseError;
use crate::model::{AgentIdentity, AgentOutput, Confidence};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json[ \t]*\r?\n(.*?)\r?\n\s*```")
        .expect("JSON_FENCE is a compile-time constant")
});
static JSON_FENCE_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)```").expect("JSON_FENCE_INLINE is a compile-time constant")
});
static GENERIC_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```")
        .expect("GENERIC_FENCE is a compile-time constant")
});
static GENERIC_FENCE_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```\s*(.*?)```").expect("GENERIC_FENCE_INLINE is a compile-time constant")
});
static FENCE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(json)?").expect("FENCE_MARKER is a compile-time constant")
});

/// A pure extraction strategy: raw text in, candidate JSON text out
pub type Strategy = fn(&str) -> Option<String>;

/// Strategies in the order they are tried
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("json_fence", json_fence),
    ("generic_fence", generic_fence),
    ("stripped_fences", stripped_fences),
    ("brace_span", brace_span),
];

/// Body of the first fence labelled `json`
pub fn json_fence(raw: &str) -> Option<String> {
    capture(&JSON_FENCE, raw).or_else(|| capture(&JSON_FENCE_INLINE, raw))
}

/// Body of the first fenced block, whatever its label
pub fn generic_fence(raw: &str) -> Option<String> {
    capture(&GENERIC_FENCE, raw).or_else(|| capture(&GENERIC_FENCE_INLINE, raw))
}

/// Whole text with every fence marker removed
pub fn stripped_fences(raw: &str) -> Option<String> {
    let stripped = FENCE_MARKER.replace_all(raw, "");
    let stripped = stripped.trim();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// From the first `{` to the last `}`, for JSON wrapped in prose
pub fn brace_span(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| raw[start..=end].to_string())
}

fn capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
}

/// Extract a JSON object from a raw provider response
///
/// On failure the error keeps the cleaned form of the first candidate any
/// strategy produced.
pub fn extract_structured(raw: &str) -> Result<Value, ParseError> {
    let mut primary: Option<String> = None;
    let mut last_error = String::from("no JSON candidate found");

    for (name, strategy) in STRATEGIES {
        let Some(candidate) = strategy(raw) else {
            continue;
        };
        let cleaned = clean_candidate(&candidate);

        match serde_json::from_str::<Value>(&cleaned) {
            Ok(value @ Value::Object(_)) => {
                debug!(strategy = name, "Extracted structured response");
                return Ok(value);
            }
            Ok(other) => {
                last_error = format!("{name}: expected a JSON object, got {}", kind_of(&other));
            }
            Err(e) => last_error = format!("{name}: {e}"),
        }

        primary.get_or_insert(cleaned);
    }

    Err(ParseError::new(
        last_error,
        primary.unwrap_or_else(|| clean_candidate(raw)),
    ))
}

/// Normalize a candidate into strict JSON
///
/// Drops `\r` and ASCII control characters, turns tabs into spaces, removes
/// `//` and `/* */` comments and trailing commas outside string literals.
/// Raw newlines inside string literals become spaces.
pub fn clean_candidate(text: &str) -> String {
    let text: String = text
        .trim()
        .chars()
        .filter_map(|c| match c {
            '\r' => None,
            '\t' => Some(' '),
            '\n' => Some('\n'),
            c if c.is_ascii_control() => None,
            c => Some(c),
        })
        .collect();

    strip_trailing_commas(&strip_comments(&text))
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                '\n' => {
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
            out.push(c);
            continue;
        }

        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                // Line comment: drop through end of line, keep the newline
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Turn an extracted JSON object into an [`AgentOutput`]
///
/// Requires a non-empty `thesis` string and at least one supporting point.
/// Object points are flattened (`reason - details`, or every string field
/// joined with " - "), points beyond four are dropped, confidence is read
/// case-insensitively and every other field is kept as an extra.
pub fn normalize_output(identity: &AgentIdentity, value: Value) -> Result<AgentOutput, ParseError> {
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(ParseError::new(
                format!("expected a JSON object, got {}", kind_of(&other)),
                other.to_string(),
            ));
        }
    };
    let snapshot = || Value::Object(fields.clone()).to_string();

    let thesis = match fields.get("thesis") {
        Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Some(_) => {
            return Err(ParseError::new("`thesis` must be a non-empty string", snapshot()));
        }
        None => return Err(ParseError::new("missing `thesis`", snapshot())),
    };

    let points = match fields.get("supporting_points").or_else(|| fields.get("supportingPoints")) {
        Some(Value::Array(items)) => items.iter().filter_map(flatten_point).collect::<Vec<_>>(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    };
    if points.is_empty() {
        return Err(ParseError::new("no supporting points", snapshot()));
    }

    let confidence = match fields.get("confidence") {
        Some(Value::String(text)) => Confidence::parse_lenient(text),
        _ => Confidence::Moderate,
    };

    for key in ["thesis", "supporting_points", "supportingPoints", "confidence"] {
        fields.remove(key);
    }

    Ok(AgentOutput::new(
        identity.clone(),
        thesis,
        points,
        confidence,
        fields,
    ))
}

fn flatten_point(point: &Value) -> Option<String> {
    let text = match point {
        Value::String(text) => text.trim().to_string(),
        Value::Object(fields) => {
            let field = |key: &str| {
                fields
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };
            match (field("reason"), field("details")) {
                (Some(reason), Some(details)) => format!("{reason} - {details}"),
                (Some(only), None) | (None, Some(only)) => only.to_string(),
                (None, None) => fields
                    .values()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" - "),
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(_) | Value::Null | Value::Array(_) => String::new(),
    };
    (!text.is_empty()).then_some(text)
}
