//! Demo tools served over the loopback bridge.

use chrono::Utc;
use serde_json::{json, Value};
use switchboard::models::tool::ToolDefinition;
use switchboard::registry::ToolRegistry;

pub fn demo_registry() -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register_fn(
        ToolDefinition::new(
            "get_current_datetime",
            "Returns the current datetime in ISO format",
            json!({"type": "object", "properties": {}}),
        ),
        |_| async move { Ok(json!(Utc::now().to_rfc3339())) },
    )?;

    registry.register_fn(
        ToolDefinition::new(
            "get_user_zipcode",
            "Returns the current user's zipcode",
            json!({"type": "object", "properties": {}}),
        ),
        |_| async move { Ok(json!("49345")) },
    )?;

    registry.register_fn(
        ToolDefinition::new(
            "get_zipcode_weather",
            "Returns the current weather for a zipcode",
            json!({
                "type": "object",
                "properties": {
                    "zipcode": {"type": "string", "description": "A five digit US zipcode"}
                },
                "required": ["zipcode"]
            }),
        ),
        |arguments| async move { Ok(json!(zipcode_weather(&arguments))) },
    )?;

    Ok(registry)
}

fn zipcode_weather(arguments: &Value) -> &'static str {
    let zipcode = arguments
        .get("zipcode")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if zipcode.starts_with('4') {
        "rainy"
    } else {
        "sunny"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let registry = demo_registry().unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["get_current_datetime", "get_user_zipcode", "get_zipcode_weather"]
        );
    }

    #[test]
    fn test_zipcode_weather() {
        assert_eq!(zipcode_weather(&json!({"zipcode": "49345"})), "rainy");
        assert_eq!(zipcode_weather(&json!({"zipcode": "90210"})), "sunny");
        assert_eq!(zipcode_weather(&json!({})), "sunny");
    }

    #[tokio::test]
    async fn test_datetime_tool_returns_iso_string() {
        let registry = demo_registry().unwrap();
        let handler = registry.lookup("get_current_datetime").unwrap();
        let value = handler.call(json!({})).await.unwrap();
        let text = value.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
    }
}
