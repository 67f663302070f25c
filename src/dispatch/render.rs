//! Tool result rendering.
//!
//! One output shape for both the terminal and the `tool` message sent back
//! to the model.

use serde_json::Value;

use super::result::ToolResult;

/// Render a tool result as display text.
///
/// In order of preference: a Markdown table for a list of records, pretty
/// JSON for any other structured payload, the joined text segments, and
/// finally the raw result as pretty JSON.
pub fn render(result: &ToolResult) -> String {
    if let Some(ref payload) = result.structured_payload {
        if let Some(records) = as_records(payload) {
            return render_table(records);
        }
        return pretty(payload);
    }

    if !result.text_segments.is_empty() {
        return result.text_segments.join("\n");
    }

    pretty(&result.raw)
}

/// A non-empty array whose elements are all objects.
fn as_records(payload: &Value) -> Option<&[Value]> {
    let items = payload.as_array()?;
    if items.is_empty() || !items.iter().all(Value::is_object) {
        return None;
    }
    Some(items)
}

fn render_table(records: &[Value]) -> String {
    let headers: Vec<&str> = records
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(format!("| {} |", headers.iter().map(|h| escape_cell(h)).collect::<Vec<_>>().join(" | ")));
    lines.push(format!("| {} |", headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")));

    for record in records {
        let cells: Vec<String> = headers.iter().map(|h| cell(record.get(*h))).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    lines.join("\n")
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape_cell(s),
        Some(other) => escape_cell(&other.to_string()),
    }
}

/// Keep a cell on one line and inside its column.
fn escape_cell(text: &str) -> String {
    text.replace("\r\n", "<br>").replace(['\n', '\r'], "<br>").replace('|', "\\|")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(payload: Value) -> ToolResult {
        ToolResult::from_result_value(json!({"structuredContent": {"result": payload}, "content": []}))
    }

    #[test]
    fn test_table_from_records() {
        let result = structured(json!([{"a": 1, "b": 2}, {"a": 3, "b": 4}]));
        assert_eq!(render(&result), "| a | b |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |");
    }

    #[test]
    fn test_table_columns_follow_first_record() {
        let result = structured(json!([
            {"name": "idx_users_email", "unique": true},
            {"name": "idx_orders", "extra": "ignored"},
            {"unique": null, "name": "pk"}
        ]));
        let rendered = render(&result);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "| name | unique |");
        assert_eq!(lines[2], "| idx_users_email | true |");
        assert_eq!(lines[3], "| idx_orders |  |");
        assert_eq!(lines[4], "| pk |  |");
    }

    #[test]
    fn test_nested_values_render_as_compact_json() {
        let result = structured(json!([{"plan": {"op": "SCAN"}, "cols": [1, 2]}]));
        assert_eq!(render(&result).lines().nth(2), Some(r#"| {"op":"SCAN"} | [1,2] |"#));
    }

    #[test]
    fn test_table_shape_for_uniform_records() {
        let records: Vec<Value> = (0..7).map(|i| json!({"id": i, "name": format!("row{}", i), "ok": i % 2 == 0})).collect();
        let rendered = render(&structured(Value::Array(records)));
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 2 + 7);
        assert_eq!(lines[1], "| --- | --- | --- |");
        for line in &lines[2..] {
            assert_eq!(line.matches('|').count(), 3 + 1);
        }
    }

    #[test]
    fn test_cells_with_pipes_and_newlines_stay_on_one_row() {
        let result = structured(json!([
            {"a": "x | y", "b": "line1\nline2"},
            {"a": 3, "b": "SCAN t\r\nUSE INDEX"}
        ]));
        let rendered = render(&result);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], r"| x \| y | line1<br>line2 |");
        assert_eq!(lines[3], "| 3 | SCAN t<br>USE INDEX |");
    }

    #[test]
    fn test_non_record_payloads_are_pretty_printed() {
        assert_eq!(render(&structured(json!({"rows": 3}))), "{\n  \"rows\": 3\n}");
        assert_eq!(render(&structured(json!([]))), "[]");
        assert_eq!(render(&structured(json!([1, {"a": 1}]))), "[\n  1,\n  {\n    \"a\": 1\n  }\n]");
        assert_eq!(render(&structured(json!("done"))), "\"done\"");
    }

    #[test]
    fn test_text_segments_joined() {
        let result = ToolResult::from_result_value(json!({
            "content": [{"type": "text", "text": "line one"}, {"type": "text", "text": "line two"}]
        }));
        assert_eq!(render(&result), "line one\nline two");
    }

    #[test]
    fn test_raw_fallback() {
        let result = ToolResult::from_result_value(json!({"content": [{"type": "image", "data": "x"}]}));
        let rendered = render(&result);
        assert!(rendered.starts_with("{\n  \"content\""));
    }

    #[test]
    fn test_render_is_deterministic() {
        let result = structured(json!([{"z": 1, "a": 2}]));
        assert_eq!(render(&result), render(&result));
        assert!(render(&result).starts_with("| z | a |"));
    }
}
