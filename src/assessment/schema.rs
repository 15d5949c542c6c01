use serde_json::Value;

/// Rewrites a JSON schema in place so strict structured-output mode accepts it.
///
/// Every node whose `type` is `"object"` gets `additionalProperties: false`
/// and, when it declares `properties`, a `required` list naming exactly those
/// keys. Nested maps and arrays are visited regardless of their own type.
pub fn enforce_strict_objects(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                let required = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|properties| {
                        properties
                            .keys()
                            .map(|key| Value::String(key.clone()))
                            .collect::<Vec<_>>()
                    });
                if let Some(required) = required {
                    map.insert("required".to_string(), Value::Array(required));
                }
            }
            for value in map.values_mut() {
                enforce_strict_objects(value);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                enforce_strict_objects(item);
            }
        }
        _ => {}
    }
}

/// Owned-value convenience wrapper around [`enforce_strict_objects`].
pub fn strict(mut schema: Value) -> Value {
    enforce_strict_objects(&mut schema);
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "title": "Evaluation",
            "type": "object",
            "properties": {
                "score": {"type": ["integer", "null"]},
                "details": {
                    "type": "object",
                    "properties": {"note": {"type": "string"}},
                    "required": []
                },
                "history": {
                    "type": "array",
                    "items": {
                        "anyOf": [
                            {"type": "object", "properties": {"at": {"type": "string"}}},
                            {"type": "null"}
                        ]
                    }
                }
            },
            "required": ["score"],
            "additionalProperties": true
        })
    }

    #[test]
    fn top_level_object_is_closed_and_fully_required() {
        let patched = strict(sample());
        assert_eq!(patched["additionalProperties"], json!(false));
        let required: Vec<&str> = patched["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required.len(), 3);
        for key in ["score", "details", "history"] {
            assert!(required.contains(&key), "missing {key}");
        }
    }

    #[test]
    fn nested_objects_inside_arrays_and_combinators_are_patched() {
        let patched = strict(sample());
        assert_eq!(
            patched["properties"]["details"]["required"],
            json!(["note"])
        );
        let inner = &patched["properties"]["history"]["items"]["anyOf"][0];
        assert_eq!(inner["additionalProperties"], json!(false));
        assert_eq!(inner["required"], json!(["at"]));
    }

    #[test]
    fn object_without_properties_only_gets_closed() {
        let patched = strict(json!({"type": "object"}));
        assert_eq!(patched, json!({"type": "object", "additionalProperties": false}));
    }

    #[test]
    fn non_object_nodes_are_left_alone() {
        let plain = json!({"type": ["integer", "null"], "minimum": 0});
        assert_eq!(strict(plain.clone()), plain);
        assert_eq!(strict(json!("plain")), json!("plain"));
        assert_eq!(strict(json!(42)), json!(42));
    }

    #[test]
    fn patching_is_idempotent() {
        let once = strict(sample());
        let twice = strict(once.clone());
        assert_eq!(once, twice);
    }
}
