//! Tolerant repair of near-JSON model output.
//!
//! Models asked for strict JSON still wrap it in markdown fences, leave
//! trailing commas, or truncate mid-structure. [`parse_with_repair`] first
//! tries a strict parse and then applies a fixed sequence of textual repairs,
//! stopping at the first one that yields valid JSON. The sequence is
//! deterministic and idempotent: already-valid JSON passes through untouched.

use serde_json::Value;

use crate::error::{AppError, Result};

/// Strict parse, then the repair sequence. Returns the first successful parse.
pub fn parse_with_repair(raw: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(value);
    }

    let mut candidate = raw.trim().to_string();
    for step in [
        strip_code_fence,
        strip_trailing_commas,
        collapse_repeated_commas,
        strip_control_chars,
        balance_delimiters,
        extract_object,
    ] {
        candidate = step(&candidate);
        if let Ok(value) = serde_json::from_str::<Value>(candidate.trim()) {
            return Ok(value);
        }
    }

    Err(AppError::ParseFailed(format!(
        "not valid JSON after repair (first 120 chars: {:?})",
        raw.chars().take(120).collect::<String>()
    )))
}

/// (a) Remove a leading ```json / ``` fence and the matching trailing fence.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed.to_string();
    };
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.rfind("```") {
        Some(end) => rest[..end].trim().to_string(),
        None => rest.trim().to_string(),
    }
}

/// (b) Remove trailing commas before `}` or `]` (outside strings).
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                // Look ahead past whitespace; drop the comma if a closer follows.
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// (c) Collapse `,,` runs into a single comma (outside strings).
fn collapse_repeated_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant_comma = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                last_significant_comma = false;
                out.push(c);
            }
            ',' => {
                if !last_significant_comma {
                    out.push(c);
                }
                last_significant_comma = true;
            }
            _ => {
                if !c.is_whitespace() {
                    last_significant_comma = false;
                }
                out.push(c);
            }
        }
    }

    out
}

/// (d) Strip ASCII control characters except tab/newline/carriage return.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// (e) Truncate to the last position where braces/brackets balance, then
/// close anything still open. Handles output cut off at the token ceiling.
fn balance_delimiters(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_balanced = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                    if stack.is_empty() {
                        last_balanced = Some(i + c.len_utf8());
                    }
                } else {
                    // Mismatched closer: cut here and close what is open.
                    return close_open(&text[..i], &stack);
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        match last_balanced {
            Some(end) => text[..end].to_string(),
            None => text.to_string(),
        }
    } else {
        // Truncated output: drop a dangling partial token, then close.
        let cut = text.trim_end().trim_end_matches(|c: char| {
            !matches!(c, '}' | ']' | '"') && !c.is_ascii_digit()
        });
        close_open(cut, &stack)
    }
}

fn close_open(text: &str, stack: &[char]) -> String {
    let mut out = text.trim_end().trim_end_matches(',').to_string();
    for closer in stack.iter().rev() {
        out.push(*closer);
    }
    out
}

/// (f) Extract the largest substring between the first `{` and the last `}`.
fn extract_object(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}
