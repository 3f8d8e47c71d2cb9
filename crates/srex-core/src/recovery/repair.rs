//! Conservative textual repairs for JSON-like spans.
//!
//! Each step is applied in turn and kept only when the result parses, or
//! when the first syntax error does not move earlier in the text.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// One repair transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStep {
    TrailingCommas,
    BareKeys,
    InnerQuotes,
    Semicolons,
    DanglingValues,
}

impl RepairStep {
    pub const ORDER: [RepairStep; 5] = [
        RepairStep::TrailingCommas,
        RepairStep::BareKeys,
        RepairStep::InnerQuotes,
        RepairStep::Semicolons,
        RepairStep::DanglingValues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStep::TrailingCommas => "trailing_commas",
            RepairStep::BareKeys => "bare_keys",
            RepairStep::InnerQuotes => "inner_quotes",
            RepairStep::Semicolons => "semicolons",
            RepairStep::DanglingValues => "dangling_values",
        }
    }

    fn apply(&self, text: &str) -> String {
        match self {
            RepairStep::TrailingCommas => strip_trailing_commas(text),
            RepairStep::BareKeys => quote_bare_keys(text),
            RepairStep::InnerQuotes => escape_inner_quotes(text),
            RepairStep::Semicolons => replace_semicolons(text),
            RepairStep::DanglingValues => fill_dangling_values(text),
        }
    }
}

/// Result of a repair pass.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// The repaired text, or the input unchanged when nothing helped.
    pub text: String,
    /// Parsed tree when the repaired text parses.
    pub value: Option<Value>,
    /// Steps that were kept, in application order.
    pub applied: Vec<RepairStep>,
}

impl RepairOutcome {
    pub fn parsed(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralRepairer;

impl StructuralRepairer {
    pub fn new() -> Self {
        Self
    }

    pub fn repair(&self, span: &str) -> RepairOutcome {
        let mut text = span.to_string();
        let mut applied = Vec::new();

        let mut error_at = match parse(&text) {
            Ok(value) => {
                return RepairOutcome {
                    text,
                    value: Some(value),
                    applied,
                }
            }
            Err(pos) => pos,
        };

        for step in RepairStep::ORDER {
            let candidate = step.apply(&text);
            if candidate == text {
                continue;
            }
            match parse(&candidate) {
                Ok(value) => {
                    applied.push(step);
                    debug!(step = step.as_str(), "repair produced parseable text");
                    return RepairOutcome {
                        text: candidate,
                        value: Some(value),
                        applied,
                    };
                }
                Err(pos) if pos >= error_at => {
                    debug!(step = step.as_str(), ?pos, "repair kept");
                    applied.push(step);
                    text = candidate;
                    error_at = pos;
                }
                Err(pos) => {
                    debug!(step = step.as_str(), ?pos, before = ?error_at, "repair regressed, discarded");
                }
            }
        }

        RepairOutcome {
            text,
            value: None,
            applied,
        }
    }
}

/// Parse, or report the (line, column) of the first syntax error.
fn parse(text: &str) -> Result<Value, (usize, usize)> {
    serde_json::from_str(text).map_err(|e| (e.line(), e.column()))
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| !c.is_whitespace())
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if ch == ',' && matches!(next_significant(&chars, i + 1), Some('}' | ']')) {
            continue;
        }
        out.push(ch);
    }
    out
}

fn is_key_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn quote_bare_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    // Last structural char seen outside strings.
    let mut last = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                last = Some('"');
            }
            out.push(ch);
            i += 1;
            continue;
        }

        if is_key_start(ch) && matches!(last, Some('{' | ',' | ';')) {
            let end = chars[i..]
                .iter()
                .position(|c| !is_key_char(*c))
                .map_or(chars.len(), |n| i + n);
            if next_significant(&chars, end) == Some(':') {
                out.push('"');
                out.extend(&chars[i..end]);
                out.push('"');
                last = Some('"');
                i = end;
                continue;
            }
        }

        if ch == '"' {
            in_string = true;
        }
        if !ch.is_whitespace() {
            last = Some(ch);
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// Escape quotes that sit inside a string value.
///
/// An unescaped quote inside a string closes it only when the next
/// significant char is a separator, a closer or a colon, or at end of text.
fn escape_inner_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(ch);
        } else if ch == '\\' {
            escaped = true;
            out.push(ch);
        } else if ch == '"' {
            match next_significant(&chars, i + 1) {
                None | Some(',' | '}' | ']' | ':' | ';') => {
                    in_string = false;
                    out.push(ch);
                }
                Some(_) => out.push_str("\\\""),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn replace_semicolons(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
        } else if ch == ';' {
            out.push(',');
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

fn fill_dangling_values(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        out.push(ch);
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if ch == ':' && matches!(next_significant(&chars, i + 1), None | Some('}' | ']' | ',')) {
            out.push_str(" null");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repaired(text: &str) -> RepairOutcome {
        StructuralRepairer::new().repair(text)
    }

    #[test]
    fn test_parseable_input_is_untouched() {
        let outcome = repaired("{\"a\": 1}");
        assert!(outcome.parsed());
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.text, "{\"a\": 1}");
    }

    #[test]
    fn test_trailing_commas() {
        let outcome = repaired("{\"a\": [1, 2,], }");
        assert_eq!(outcome.applied, vec![RepairStep::TrailingCommas]);
        assert_eq!(outcome.value.unwrap()["a"][1], 2);
    }

    #[test]
    fn test_bare_keys_are_quoted() {
        let outcome = repaired("{name: \"api\", error-budget: 2}");
        let value = outcome.value.unwrap();
        assert_eq!(value["name"], "api");
        assert_eq!(value["error-budget"], 2);
    }

    #[test]
    fn test_inner_quotes_are_escaped() {
        let outcome = repaired("{\"description\": \"the \"fast\" path\", \"n\": 1}");
        assert_eq!(outcome.applied, vec![RepairStep::InnerQuotes]);
        let value = outcome.value.unwrap();
        assert_eq!(value["description"], "the \"fast\" path");
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_semicolons_outside_strings_only() {
        let outcome = repaired("{\"a\": \"x; y\"; \"b\": 2}");
        let value = outcome.value.unwrap();
        assert_eq!(value["a"], "x; y");
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn test_dangling_key_becomes_null() {
        let outcome = repaired("{\"a\": 1, \"b\": }");
        assert_eq!(outcome.applied, vec![RepairStep::DanglingValues]);
        assert!(outcome.value.unwrap()["b"].is_null());
    }

    #[test]
    fn test_steps_chain() {
        let outcome = repaired("{metric: \"lat\", note: \"use \"p99\"\",}");
        assert!(outcome.parsed());
        assert_eq!(
            outcome.applied,
            vec![
                RepairStep::TrailingCommas,
                RepairStep::BareKeys,
                RepairStep::InnerQuotes
            ]
        );
        assert_eq!(outcome.value.unwrap()["note"], "use \"p99\"");
    }

    #[test]
    fn test_hopeless_text_returns_unparsed() {
        let outcome = repaired("{\"a\": ??? }");
        assert!(!outcome.parsed());
    }

    #[test]
    fn test_string_contents_survive_comma_strip() {
        assert_eq!(strip_trailing_commas("{\"a\": \"x,]\"}"), "{\"a\": \"x,]\"}");
    }
}
