//! Structural validation of a JSON value against a JSON-schema-like
//! description.
//!
//! Covers the subset of JSON Schema the orchestration actually uses —
//! `type`, `properties`, `required`, `items`, `minItems`, `maxItems`,
//! `maxLength`, `minimum` — which is enough to drive meaningful feedback
//! retries. Unknown keywords are ignored.

/// Validate `value` against `schema`. The error string names the failing
/// path and is phrased for the model.
pub(crate) fn validate(value: &serde_json::Value, schema: &serde_json::Value) -> Result<(), String> {
    validate_at(value, schema, "$")
}

fn validate_at(
    value: &serde_json::Value,
    schema: &serde_json::Value,
    path: &str,
) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        check_type(value, expected, path)?;
    }

    match value {
        serde_json::Value::Object(map) => {
            if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
                for key in required.iter().filter_map(|k| k.as_str()) {
                    if !map.contains_key(key) {
                        return Err(format!("{path}: missing required property \"{key}\""));
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
                for (key, sub_schema) in properties {
                    if let Some(sub_value) = map.get(key) {
                        validate_at(sub_value, sub_schema, &format!("{path}.{key}"))?;
                    }
                }
            }
        }
        serde_json::Value::Array(items) => {
            if let Some(min) = schema.get("minItems").and_then(|m| m.as_u64()) {
                if (items.len() as u64) < min {
                    return Err(format!("{path}: expected at least {min} items"));
                }
            }
            if let Some(max) = schema.get("maxItems").and_then(|m| m.as_u64()) {
                if (items.len() as u64) > max {
                    return Err(format!("{path}: expected at most {max} items"));
                }
            }
            if let Some(item_schema) = schema.get("items") {
                for (index, item) in items.iter().enumerate() {
                    validate_at(item, item_schema, &format!("{path}[{index}]"))?;
                }
            }
        }
        serde_json::Value::String(s) => {
            if let Some(max) = schema.get("maxLength").and_then(|m| m.as_u64()) {
                if (s.chars().count() as u64) > max {
                    return Err(format!("{path}: string longer than {max} characters"));
                }
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(min) = schema.get("minimum").and_then(|m| m.as_f64()) {
                if n.as_f64().is_some_and(|v| v < min) {
                    return Err(format!("{path}: number below minimum {min}"));
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn check_type(value: &serde_json::Value, expected: &str, path: &str) -> Result<(), String> {
    let ok = match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{path}: expected {expected}"))
    }
}
