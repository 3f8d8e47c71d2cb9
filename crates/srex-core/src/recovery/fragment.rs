//! Rebuilds a minimal object from individually well-formed `"key": value` pairs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

// Values are limited to scalars and flat (non-nested) arrays or objects so
// that each match can be parsed on its own.
static PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""([A-Za-z_][A-Za-z0-9_\- ]*)"\s*:\s*("(?:[^"\\]|\\.)*"|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|true|false|null|\[[^\[\]]*\]|\{[^{}]*\})"#,
    )
    .expect("fragment pair pattern is valid")
});

/// Reassemble an object from the well-formed pairs found in `text`.
///
/// The first occurrence of a key wins. Returns `None` when no pair survives.
pub fn rebuild_fragments(text: &str) -> Option<Value> {
    let mut object = Map::new();
    let mut rejected = 0usize;

    for caps in PAIR.captures_iter(text) {
        let key = &caps[1];
        if object.contains_key(key) {
            continue;
        }
        match serde_json::from_str::<Value>(&caps[2]) {
            Ok(value) => {
                object.insert(key.to_string(), value);
            }
            Err(_) => rejected += 1,
        }
    }

    debug!(kept = object.len(), rejected, "fragment rebuild");
    if object.is_empty() {
        None
    } else {
        Some(Value::Object(object))
    }
}
