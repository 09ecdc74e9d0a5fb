use serde_json::{Map, Number, Value};

/// One row of the dataset: field name to scalar value, in column order.
pub type Record = Map<String, Value>;

/// Prefix used for rows that have no usable value in the selected field.
pub const FALLBACK_PREFIX: &str = "Participant_";

/// Returns the display text for `record[field_key]`.
///
/// Missing, null and blank values resolve to `Participant_{row_index + 1}`;
/// everything else is converted to text and trimmed. The result is never empty.
pub fn resolve_text(record: &Record, field_key: &str, row_index: usize) -> String {
    let text = match record.get(field_key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(number_to_text(n)),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string().trim().to_string()),
    };

    match text {
        Some(t) if !t.is_empty() => t,
        _ => format!("{}{}", FALLBACK_PREFIX, row_index + 1),
    }
}

// Spreadsheet numbers arrive as floats; `42.0` should read as `42`.
fn number_to_text(n: &Number) -> String {
    if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
            return format!("{}", f as i64);
        }
    }
    n.to_string()
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
///
/// An empty label yields `"_"` so the result is always a usable file name part.
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match json!({ "Name": value }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_resolve_trims_value() {
        assert_eq!(resolve_text(&record(json!("  Alice  ")), "Name", 0), "Alice");
    }

    #[test]
    fn test_resolve_fallbacks() {
        assert_eq!(resolve_text(&record(json!("")), "Name", 0), "Participant_1");
        assert_eq!(resolve_text(&record(json!("   ")), "Name", 4), "Participant_5");
        assert_eq!(resolve_text(&record(Value::Null), "Name", 9), "Participant_10");
        assert_eq!(resolve_text(&record(json!("Bob")), "Missing", 2), "Participant_3");
        assert_eq!(resolve_text(&Record::new(), "Name", 0), "Participant_1");
    }

    #[test]
    fn test_resolve_numbers_and_bools() {
        assert_eq!(resolve_text(&record(json!(42)), "Name", 0), "42");
        assert_eq!(resolve_text(&record(json!(42.0)), "Name", 0), "42");
        assert_eq!(resolve_text(&record(json!(-3.5)), "Name", 0), "-3.5");
        assert_eq!(resolve_text(&record(json!(0)), "Name", 0), "0");
        assert_eq!(resolve_text(&record(json!(false)), "Name", 0), "false");
    }

    #[test]
    fn test_resolve_is_never_empty() {
        for (i, v) in [json!(""), json!(null), json!(" \t "), json!([])].into_iter().enumerate() {
            assert!(!resolve_text(&record(v), "Name", i).is_empty());
        }
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Jo Doe!"), "Jo_Doe_");
        assert_eq!(sanitize_label("Zoë"), "Zo_");
        assert_eq!(sanitize_label("abc123"), "abc123");
        assert_eq!(sanitize_label(""), "_");
    }
}
