use serde_json::Value;

use crate::model::JsonMap;

const STRIPPED_KEYS: [&str; 2] = ["chart_html", "chart_html_fragment"];
const FORBIDDEN_PREFIXES: [&str; 5] = ["<!doctype", "<html", "<head", "<body", "<script"];

/// True when a string opens with a full HTML document or script tag.
pub fn is_forbidden_markup(text: &str) -> bool {
    let head = text.trim_start().to_ascii_lowercase();
    FORBIDDEN_PREFIXES.iter().any(|prefix| head.starts_with(prefix))
}

/// Deep-filters a widget payload in place: chart html keys are removed and
/// forbidden markup strings are blanked. Structure is otherwise preserved.
pub fn sanitize_widget_data(data: &mut JsonMap) {
    data.retain(|key, _| {
        !STRIPPED_KEYS
            .iter()
            .any(|stripped| key.eq_ignore_ascii_case(stripped))
    });
    for value in data.values_mut() {
        sanitize_value(value);
    }
}

fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(text) if is_forbidden_markup(text) => text.clear(),
        Value::Array(items) => items.iter_mut().for_each(sanitize_value),
        Value::Object(map) => sanitize_widget_data(map),
        _ => {}
    }
}
