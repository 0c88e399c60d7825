//! Text rendering of console arguments.

use serde_json::Value;
use std::fmt::Write;

/// Nesting depth after which arrays collapse to `[...]`.
const MAX_DEPTH: usize = 3;

/// Array items shown before eliding the rest.
const MAX_ITEMS: usize = 10;

/// Format arguments for console output, space separated.
pub fn format_args(args: &[Value]) -> String {
    let mut output = String::new();

    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        let _ = write!(output, "{}", format_value(arg, 0));
    }

    output
}

/// Format a single value.
///
/// Strings print verbatim, scalars use their display form, arrays are
/// rendered element-wise and objects as compact JSON.
pub fn format_value(value: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return "[...]".to_string();
    }

    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let mut parts: Vec<String> = items
                .iter()
                .take(MAX_ITEMS)
                .map(|item| format_value(item, depth + 1))
                .collect();

            if items.len() > MAX_ITEMS {
                parts.push(format!("... {} more items", items.len() - MAX_ITEMS));
            }

            format!("[{}]", parts.join(", "))
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_else(|_| "Invalid value".to_string()),
    }
}
