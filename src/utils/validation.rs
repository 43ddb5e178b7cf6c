use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::utils::api_response::ApiResponse;

/// Accumulates per-field validation messages and converts them into the
/// standard 422 response with a field -> [messages] map.
#[derive(Debug, Default)]
pub struct FieldErrors {
    fields: Map<String, Value>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let messages = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = messages {
            list.push(Value::String(message.into()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_error(self) -> ApiResponse<()> {
        ApiResponse::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed",
            Some(Value::Object(self.fields)),
        )
    }
}

/// Lane colors are stored as `#rrggbb` (or the short `#rgb`) strings.
pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_multiple_messages_per_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.is_empty());

        errors.add("name", "The name field is required.");
        errors.add("name", "The name may not be greater than 255 characters.");
        errors.add("team_id", "The selected team is invalid.");
        assert!(!errors.is_empty());

        let response = errors.into_error();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status_code"], 422);
        assert_eq!(value["errors"]["name"].as_array().unwrap().len(), 2);
        assert_eq!(
            value["errors"]["team_id"][0],
            "The selected team is invalid."
        );
    }

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#64748b"));
        assert!(is_hex_color("#fff"));
        assert!(!is_hex_color("64748b"));
        assert!(!is_hex_color("#64748"));
        assert!(!is_hex_color("#gggggg"));
        assert!(!is_hex_color(""));
    }
}
