//! Structural validation of generated level content
//!
//! Interprets the subset of JSON Schema the registry uses: `type`,
//! `properties`, `required`, `items`, `minItems`/`maxItems`,
//! `minimum`/`maximum`, and `enum`. Gateway responses and fallback
//! skeletons both pass through here, so downstream consumers only ever
//! see conformant shapes.

use serde_json::Value;

/// A single schema violation, with a JSON-pointer-style path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for Violation {}

/// Validate a value against a schema
pub fn validate(schema: &Value, value: &Value) -> Result<(), Violation> {
    validate_at(schema, value, "$")
}

fn validate_at(schema: &Value, value: &Value, path: &str) -> Result<(), Violation> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        check_type(expected, value, path)?;
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        return Err(Violation {
            path: path.to_string(),
            message: format!("value {} not in enum {:?}", value, allowed),
        });
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !obj.contains_key(key) {
                    return Err(Violation {
                        path: path.to_string(),
                        message: format!("missing required field '{}'", key),
                    });
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, prop_schema) in properties {
                if let Some(prop_value) = obj.get(key) {
                    validate_at(prop_schema, prop_value, &format!("{}.{}", path, key))?;
                }
            }
        }
    }

    if let Some(items) = value.as_array() {
        check_cardinality(schema, items.len(), path)?;

        if let Some(item_schema) = schema.get("items") {
            for (idx, item) in items.iter().enumerate() {
                validate_at(item_schema, item, &format!("{}[{}]", path, idx))?;
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
            && n < min
        {
            return Err(Violation {
                path: path.to_string(),
                message: format!("{} below minimum {}", n, min),
            });
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
            && n > max
        {
            return Err(Violation {
                path: path.to_string(),
                message: format!("{} above maximum {}", n, max),
            });
        }
    }

    Ok(())
}

fn check_type(expected: &str, value: &Value, path: &str) -> Result<(), Violation> {
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
        Err(Violation {
            path: path.to_string(),
            message: format!("expected {}, got {}", expected, type_name(value)),
        })
    }
}

fn check_cardinality(schema: &Value, len: usize, path: &str) -> Result<(), Violation> {
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64)
        && (len as u64) < min
    {
        return Err(Violation {
            path: path.to_string(),
            message: format!("{} items, minimum is {}", len, min),
        });
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64)
        && (len as u64) > max
    {
        return Err(Violation {
            path: path.to_string(),
            message: format!("{} items, maximum is {}", len, max),
        });
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
