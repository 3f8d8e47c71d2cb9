//! Isolates the most plausible single JSON object inside arbitrary text.
//!
//! Order of attempts:
//! 1. Whole trimmed text parses as JSON (fast path)
//! 2. Last markdown ```` ``` ```` fence
//! 3. Conversational reply check (text not opening with `{`/`[`)
//! 4. String-aware brace matching from the first `{`
//! 5. Span up to the last `}`, if that span parses
//! 6. Pad with synthesized closers for every unmatched opener

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static CONVERSATIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(hello|hi|hey|how can i help|what would you like|is there something|can i help you|let me help|i'd be happy to help|i would be happy to help|sure|absolutely|of course)\b",
    )
    .expect("conversational marker pattern is valid")
});

/// How a span was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanMethod {
    /// The whole trimmed input parsed as-is.
    Whole,
    /// Contents of the last markdown code fence.
    Fence,
    /// First `{` up to its matching `}`.
    Balanced,
    /// First `{` up to the last `}` in the text.
    LastBrace,
    /// First `{` to end of text plus synthesized closers.
    Padded,
}

/// A candidate JSON span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub method: SpanMethod,
}

/// Outcome of extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(Span),
    /// A chat-style reply that never contained data.
    Conversational,
    /// No `{` anywhere in the text.
    NoObject,
}

impl Extraction {
    pub fn span(&self) -> Option<&Span> {
        match self {
            Extraction::Found(span) => Some(span),
            _ => None,
        }
    }
}

/// Locate the most plausible JSON object in `text`.
pub fn extract_object(text: &str) -> Extraction {
    let trimmed = text.trim();
    if serde_json::from_str::<Value>(trimmed).is_ok() {
        return found(trimmed, SpanMethod::Whole);
    }

    let fenced = last_markdown_fence(trimmed);
    let body = fenced.as_deref().map(str::trim).unwrap_or(trimmed);
    if fenced.is_some() && serde_json::from_str::<Value>(body).is_ok() {
        return found(body, SpanMethod::Fence);
    }

    if !(body.starts_with('{') || body.starts_with('[')) && is_conversational(body) {
        debug!(len = body.len(), "conversational reply, skipping brace scan");
        return Extraction::Conversational;
    }

    let Some(start) = body.find('{') else {
        return Extraction::NoObject;
    };
    let tail = &body[start..];

    if let Some(end) = matching_close(tail) {
        return found(&tail[..end], SpanMethod::Balanced);
    }

    if let Some(last) = tail.rfind('}') {
        let candidate = &tail[..=last];
        if serde_json::from_str::<Value>(candidate).is_ok() {
            return found(candidate, SpanMethod::LastBrace);
        }
    }

    debug!(len = tail.len(), "unbalanced braces, padding closers");
    found(&pad_closers(tail), SpanMethod::Padded)
}

fn found(text: &str, method: SpanMethod) -> Extraction {
    Extraction::Found(Span {
        text: text.to_string(),
        method,
    })
}

/// Whether `text` reads like a greeting or an offer to help.
pub fn is_conversational(text: &str) -> bool {
    CONVERSATIONAL.is_match(text)
}

/// Contents of the last ```` ``` ```` fenced block, if any.
fn last_markdown_fence(text: &str) -> Option<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            None if trimmed.starts_with("```") => current = Some(Vec::new()),
            None => {}
            Some(lines) if trimmed == "```" => {
                if !lines.is_empty() {
                    blocks.push(lines.join("\n"));
                }
                current = None;
            }
            Some(lines) => lines.push(line),
        }
    }
    // An unterminated fence still counts; truncated replies end mid-block.
    if let Some(lines) = current {
        if !lines.is_empty() {
            blocks.push(lines.join("\n"));
        }
    }
    blocks.pop()
}

/// Tracks string state while scanning JSON-ish text.
#[derive(Default)]
struct Scanner {
    in_string: bool,
    escaped: bool,
    stack: Vec<char>,
}

impl Scanner {
    /// Feed one char; returns true when it was structural (outside a string).
    fn feed(&mut self, ch: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return false;
        }
        match ch {
            '"' => self.in_string = true,
            '{' | '[' => self.stack.push(ch),
            '}' => {
                while let Some(open) = self.stack.pop() {
                    if open == '{' {
                        break;
                    }
                }
            }
            ']' => {
                if self.stack.last() == Some(&'[') {
                    self.stack.pop();
                }
            }
            _ => {}
        }
        true
    }
}

/// Byte offset one past the `}` matching the leading `{` of `text`.
fn matching_close(text: &str) -> Option<usize> {
    let mut scanner = Scanner::default();
    for (i, ch) in text.char_indices() {
        let structural = scanner.feed(ch);
        if structural && ch == '}' && scanner.stack.is_empty() {
            return Some(i + ch.len_utf8());
        }
    }
    None
}

/// Append closers for every unmatched opener, never removing an opener.
///
/// An unterminated string is closed first; a dangling escape is dropped so
/// the synthesized quote is not swallowed by it.
pub fn pad_closers(text: &str) -> String {
    let mut scanner = Scanner::default();
    for ch in text.chars() {
        scanner.feed(ch);
    }

    let mut out = text.to_string();
    if scanner.in_string {
        if scanner.escaped {
            out.pop();
        }
        out.push('"');
    }
    for open in scanner.stack.iter().rev() {
        out.push(if *open == '{' { '}' } else { ']' });
    }
    out
}
