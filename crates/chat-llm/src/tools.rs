//! Tool definition types for LLM tool use

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition for LLM provider
///
/// This describes a tool that the LLM can use, including its name,
/// description, and input schema in JSON Schema format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within a tool set
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON schema for the tool's input parameters
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Helper module to build and reshape JSON schemas for tools
pub mod schema {
    use serde_json::{Map, Value, json};

    /// Keys Gemini accepts inside a function parameter schema
    const GEMINI_SCHEMA_KEYS: &[&str] = &[
        "type",
        "format",
        "description",
        "nullable",
        "enum",
        "items",
        "properties",
        "required",
        "minimum",
        "maximum",
        "minItems",
        "maxItems",
        "minLength",
        "maxLength",
        "pattern",
        "anyOf",
    ];

    /// Nested `$ref` chains deeper than this are dropped
    const MAX_REF_DEPTH: usize = 16;

    /// Create a JSON schema for an object with properties
    ///
    /// # Example
    ///
    /// ```
    /// use chat_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({
    ///         "a": schema::number("First operand"),
    ///         "b": schema::number("Second operand"),
    ///     }),
    ///     vec!["a", "b"],
    /// );
    /// assert_eq!(schema["required"][1], "b");
    /// ```
    pub fn object(properties: Value, required: Vec<&str>) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// String property schema
    pub fn string(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description,
        })
    }

    /// Number property schema
    pub fn number(description: &str) -> Value {
        json!({
            "type": "number",
            "description": description,
        })
    }

    /// Integer property schema
    pub fn integer(description: &str) -> Value {
        json!({
            "type": "integer",
            "description": description,
        })
    }

    /// Boolean property schema
    pub fn boolean(description: &str) -> Value {
        json!({
            "type": "boolean",
            "description": description,
        })
    }

    /// Array property schema
    pub fn array(description: &str, items: Value) -> Value {
        json!({
            "type": "array",
            "description": description,
            "items": items,
        })
    }

    /// Reshape a JSON Schema into the OpenAPI subset Gemini accepts
    ///
    /// Local `$ref`s into `$defs`/`definitions` are inlined, unknown keys are
    /// dropped, nullable unions collapse to `nullable: true`, `required` is
    /// filtered to declared properties and enum values become strings.
    pub fn sanitize_for_gemini(schema: &Value) -> Value {
        let defs = collect_definitions(schema);
        sanitize_node(schema, &defs, 0)
    }

    /// True when a sanitized schema declares no parameters at all
    pub fn is_empty_object(schema: &Value) -> bool {
        match schema {
            Value::Object(map) => map
                .get("properties")
                .and_then(Value::as_object)
                .is_none_or(Map::is_empty),
            _ => true,
        }
    }

    fn collect_definitions(schema: &Value) -> Map<String, Value> {
        let mut defs = Map::new();
        for key in ["definitions", "$defs"] {
            if let Some(Value::Object(entries)) = schema.get(key) {
                for (name, def) in entries {
                    defs.insert(name.clone(), def.clone());
                }
            }
        }
        defs
    }

    fn resolve_ref<'a>(reference: &str, defs: &'a Map<String, Value>) -> Option<&'a Value> {
        let name = reference
            .strip_prefix("#/$defs/")
            .or_else(|| reference.strip_prefix("#/definitions/"))?;
        defs.get(name)
    }

    fn sanitize_node(node: &Value, defs: &Map<String, Value>, depth: usize) -> Value {
        let Value::Object(map) = node else {
            return node.clone();
        };

        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            if depth >= MAX_REF_DEPTH {
                return json!({ "type": "object" });
            }
            let Some(target) = resolve_ref(reference, defs) else {
                return json!({ "type": "object" });
            };
            let mut resolved = sanitize_node(target, defs, depth + 1);
            // Sibling description wins over the referenced one.
            if let (Some(desc), Value::Object(out)) = (map.get("description"), &mut resolved) {
                out.insert("description".to_string(), desc.clone());
            }
            return resolved;
        }

        let mut out = Map::new();
        let mut nullable = false;

        for (key, value) in map {
            match key.as_str() {
                "type" => match value {
                    Value::Array(types) => {
                        let mut concrete = types.iter().filter(|t| t.as_str() != Some("null"));
                        nullable |= types.iter().any(|t| t.as_str() == Some("null"));
                        if let Some(first) = concrete.next() {
                            out.insert("type".to_string(), first.clone());
                        }
                    }
                    other => {
                        out.insert("type".to_string(), other.clone());
                    }
                },
                "properties" => {
                    if let Value::Object(props) = value {
                        let cleaned: Map<String, Value> = props
                            .iter()
                            .map(|(name, prop)| (name.clone(), sanitize_node(prop, defs, depth)))
                            .collect();
                        out.insert("properties".to_string(), Value::Object(cleaned));
                    }
                }
                "items" => {
                    out.insert("items".to_string(), sanitize_node(value, defs, depth));
                }
                "anyOf" => {
                    if let Value::Array(variants) = value {
                        let is_null = |v: &Value| v.get("type").and_then(Value::as_str) == Some("null");
                        nullable |= variants.iter().any(is_null);
                        let concrete: Vec<Value> = variants
                            .iter()
                            .filter(|v| !is_null(*v))
                            .map(|v| sanitize_node(v, defs, depth))
                            .collect();
                        match concrete.len() {
                            0 => {}
                            1 => {
                                if let Value::Object(single) = &concrete[0] {
                                    for (k, v) in single {
                                        out.entry(k.clone()).or_insert_with(|| v.clone());
                                    }
                                }
                            }
                            _ => {
                                out.insert("anyOf".to_string(), Value::Array(concrete));
                            }
                        }
                    }
                }
                "enum" => {
                    if let Value::Array(values) = value {
                        let as_strings: Vec<Value> = values
                            .iter()
                            .filter(|v| !v.is_null())
                            .map(|v| match v {
                                Value::String(s) => Value::String(s.clone()),
                                other => Value::String(other.to_string()),
                            })
                            .collect();
                        out.insert("enum".to_string(), Value::Array(as_strings));
                    }
                }
                "nullable" => {
                    nullable |= value.as_bool().unwrap_or(false);
                }
                k if GEMINI_SCHEMA_KEYS.contains(&k) => {
                    out.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }

        if out.contains_key("enum") {
            out.insert("type".to_string(), Value::String("string".to_string()));
        }

        if let Some(Value::Array(required)) = out.get("required") {
            let declared = out.get("properties").and_then(Value::as_object);
            let kept: Vec<Value> = required
                .iter()
                .filter(|name| {
                    name.as_str()
                        .is_some_and(|n| declared.is_some_and(|props| props.contains_key(n)))
                })
                .cloned()
                .collect();
            if kept.is_empty() {
                out.remove("required");
            } else {
                out.insert("required".to_string(), Value::Array(kept));
            }
        }

        if nullable {
            out.insert("nullable".to_string(), Value::Bool(true));
        }

        Value::Object(out)
    }
}
