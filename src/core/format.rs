use crate::domain::model::ModuleProfile;
use chrono::NaiveDate;

/// Keys carrying a `data` token hold dates (`data_pedido`, `data_entrega`).
pub fn is_date_key(key: &str) -> bool {
    key.split('_').any(|token| token == "data")
}

/// `dd/mm/yyyy`, the display format used across the back office.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

fn format_date_value(raw: &str) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%d/%m/%Y").to_string());
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.format("%d/%m/%Y").to_string());
    }
    // 已是顯示格式就原樣保留
    if parse_date(raw).is_some() {
        return Some(raw.to_string());
    }
    None
}

/// Rendering rules, checked in order: module override, null, date-keyed
/// values, booleans as the profile's status labels, plain coercion.
pub fn format_value(profile: &ModuleProfile, key: &str, value: &serde_json::Value) -> String {
    if let Some(render) = &profile.render {
        if let Some(rendered) = render(key, value) {
            return rendered;
        }
    }

    if value.is_null() {
        return String::new();
    }

    if is_date_key(key) {
        if let Some(raw) = value.as_str() {
            if let Some(formatted) = format_date_value(raw) {
                return formatted;
            }
        }
    }

    if let Some(active) = value.as_bool() {
        return if active {
            profile.active_label.clone()
        } else {
            profile.inactive_label.clone()
        };
    }

    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
