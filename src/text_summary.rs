//! Text summary builder for CLI output.
//!
//! The simulator's output has no fixed schema, so this only describes its shape.

use house_sim_bridge::model::RunSummary;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(summary: &RunSummary) -> TextSummary {
    let mut lines = vec![format!("House: {}", summary.id)];
    lines.push(format!("Finished: {}", summary.finished_at_utc));
    if let Some(path) = summary.path.as_ref() {
        lines.push(format!("Result: {}", path.display()));
    }
    if let Some(err) = summary.error.as_deref() {
        lines.push(format!(
            "Error ({}): {err}",
            summary.error_kind.unwrap_or("unknown")
        ));
    }
    if let Some(data) = summary.data.as_ref() {
        lines.extend(describe_data(data));
    }
    TextSummary { lines }
}

/// One line per top-level field of a result document.
pub(crate) fn describe_data(data: &serde_json::Value) -> Vec<String> {
    match data {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("  {k}: {}", describe_value(v)))
            .collect(),
        other => vec![format!("  {}", describe_value(other))],
    }
}

fn describe_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Array(items) => format!("{} entries", items.len()),
        serde_json::Value::Object(map) => format!("{} fields", map.len()),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
