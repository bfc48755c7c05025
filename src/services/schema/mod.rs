//! JSON schema validation of request fragments.
//!
//! Definitions are JSON Schema 2020-12 plus OpenAPI's `nullable`. The
//! `jsonschema` crate evaluates them; this module layers on top:
//! - the crate's string formats (`byte`, `uuid`, `date-time`, `date`, `email`, `uri`)
//! - strict mode (unknown keywords fail compilation)
//! - coercion of string sources (query, path, headers) into the declared types

mod formats;

use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use serde_json::{Map, Value};
use thiserror::Error;

pub use formats::Format;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema at `{path}` must be an object or a boolean")]
    NotASchema { path: String },
    #[error("unsupported keyword `{keyword}` at `{path}`")]
    UnknownKeyword { path: String, keyword: String },
    #[error("invalid value for `{keyword}` at `{path}`")]
    InvalidKeyword { path: String, keyword: String },
    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// A value that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer into the validated value.
    pub path: String,
    pub reason: String,
}

impl Violation {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason: reason.into(),
        }
    }
}

/// Keywords whose value is a single subschema.
const SUBSCHEMA: [&str; 11] = [
    "additionalProperties",
    "items",
    "contains",
    "propertyNames",
    "not",
    "if",
    "then",
    "else",
    "unevaluatedItems",
    "unevaluatedProperties",
    "contentSchema",
];

/// Keywords whose value is an array of subschemas.
const SUBSCHEMA_LIST: [&str; 4] = ["allOf", "anyOf", "oneOf", "prefixItems"];

/// Keywords whose value maps names to subschemas.
const SUBSCHEMA_MAP: [&str; 5] = [
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
];

const ASSERTIONS: [&str; 20] = [
    "type",
    "enum",
    "const",
    "multipleOf",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "maxContains",
    "minContains",
    "maxProperties",
    "minProperties",
    "required",
    "dependentRequired",
];

const CORE_AND_ANNOTATIONS: [&str; 20] = [
    "$schema",
    "$id",
    "$ref",
    "$anchor",
    "$dynamicRef",
    "$dynamicAnchor",
    "$vocabulary",
    "$comment",
    "format",
    "contentEncoding",
    "contentMediaType",
    "title",
    "description",
    "default",
    "deprecated",
    "readOnly",
    "writeOnly",
    "examples",
    "example",
    "nullable",
];

fn is_known(keyword: &str) -> bool {
    SUBSCHEMA.contains(&keyword)
        || SUBSCHEMA_LIST.contains(&keyword)
        || SUBSCHEMA_MAP.contains(&keyword)
        || ASSERTIONS.contains(&keyword)
        || CORE_AND_ANNOTATIONS.contains(&keyword)
}

/// A compiled schema.
#[derive(Clone)]
pub struct Schema {
    definition: Value,
    validator: Arc<Validator>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl Schema {
    /// Compile `definition`. In strict mode unknown keywords and formats are errors,
    /// otherwise they are ignored as annotations.
    pub fn compile(definition: &Value, strict: bool) -> Result<Self, SchemaError> {
        let mut definition = definition.clone();
        normalize(&mut definition, "", strict)?;

        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .should_validate_formats(true)
            .should_ignore_unknown_formats(!strict)
            .with_format("byte", |s: &str| Format::Byte.matches(s))
            .with_format("uuid", |s: &str| Format::Uuid.matches(s))
            .with_format("date-time", |s: &str| Format::DateTime.matches(s))
            .with_format("date", |s: &str| Format::Date.matches(s))
            .with_format("email", |s: &str| Format::Email.matches(s))
            .with_format("uri", |s: &str| Format::Uri.matches(s))
            .with_format("url", |s: &str| Format::Uri.matches(s))
            .build(&definition)
            .map_err(|err| SchemaError::Invalid(err.to_string()))?;

        Ok(Self {
            definition,
            validator: Arc::new(validator),
        })
    }

    pub fn validate(&self, value: &Value) -> Result<(), Violation> {
        self.validator
            .validate(value)
            .map_err(|err| Violation::new(&err.instance_path.to_string(), err.to_string()))
    }

    /// Convert string leaves into the scalar type the schema asks for
    /// (`"25"` -> 25, `"true"` -> true, a lone string -> one element array).
    pub fn coerce(&self, value: Value) -> Value {
        coerce(&self.definition, value)
    }
}

/// Shape check, strict keyword check and `nullable` rewrite, in place.
fn normalize(definition: &mut Value, path: &str, strict: bool) -> Result<(), SchemaError> {
    let object = match definition {
        Value::Bool(_) => return Ok(()),
        Value::Object(object) => object,
        _ => {
            return Err(SchemaError::NotASchema {
                path: path.to_string(),
            });
        }
    };

    let invalid = |keyword: &str| SchemaError::InvalidKeyword {
        path: path.to_string(),
        keyword: keyword.to_string(),
    };

    // Draft-07 spelling; 2020-12 evaluators skip it silently.
    if object.contains_key("dependencies") {
        return Err(invalid("dependencies"));
    }

    if strict {
        if let Some(unknown) = object.keys().find(|k| !is_known(k)) {
            return Err(SchemaError::UnknownKeyword {
                path: path.to_string(),
                keyword: unknown.clone(),
            });
        }
    }

    if let Some(nullable) = object.remove("nullable") {
        let nullable = nullable.as_bool().ok_or_else(|| invalid("nullable"))?;
        if nullable {
            allow_null(object);
        }
    }

    for (keyword, value) in object.iter_mut() {
        let keyword = keyword.as_str();
        if SUBSCHEMA.contains(&keyword) {
            normalize(value, &format!("{path}/{keyword}"), strict)?;
        } else if SUBSCHEMA_LIST.contains(&keyword) {
            let list = value.as_array_mut().ok_or_else(|| invalid(keyword))?;
            for (i, sub) in list.iter_mut().enumerate() {
                normalize(sub, &format!("{path}/{keyword}/{i}"), strict)?;
            }
        } else if SUBSCHEMA_MAP.contains(&keyword) {
            let map = value.as_object_mut().ok_or_else(|| invalid(keyword))?;
            for (name, sub) in map.iter_mut() {
                normalize(sub, &format!("{path}/{keyword}/{name}"), strict)?;
            }
        }
    }

    Ok(())
}

fn allow_null(object: &mut Map<String, Value>) {
    if let Some(Value::String(name)) = object.get("type") {
        let widened = Value::Array(vec![Value::String(name.clone()), "null".into()]);
        object.insert("type".into(), widened);
    } else if let Some(Value::Array(names)) = object.get_mut("type") {
        if !names.iter().any(|n| n == "null") {
            names.push("null".into());
        }
    }

    if let Some(Value::Array(allowed)) = object.get_mut("enum") {
        if !allowed.contains(&Value::Null) {
            allowed.push(Value::Null);
        }
    }
}

fn type_names(node: &Value) -> Vec<&str> {
    match node.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn coerce(node: &Value, value: Value) -> Value {
    if !node.is_object() {
        return value;
    }

    match value {
        Value::String(s) => coerce_string(node, s),
        Value::Array(items) => match node.get("items") {
            Some(item_node) => Value::Array(items.into_iter().map(|v| coerce(item_node, v)).collect()),
            None => Value::Array(items),
        },
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(name, v)| {
                    let child = node
                        .get("properties")
                        .and_then(|properties| properties.get(&name))
                        .or_else(|| node.get("additionalProperties"));
                    let v = match child {
                        Some(child) => coerce(child, v),
                        None => v,
                    };
                    (name, v)
                })
                .collect(),
        ),
        other => other,
    }
}

fn coerce_string(node: &Value, s: String) -> Value {
    let types = type_names(node);
    if types.is_empty() || types.contains(&"string") {
        return Value::String(s);
    }

    for ty in types {
        let coerced = match ty {
            "integer" => s.trim().parse::<i64>().ok().map(Value::from),
            "number" => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number)),
            "boolean" => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            "null" => (s.is_empty() || s == "null").then_some(Value::Null),
            "array" => {
                let single = Value::String(s.clone());
                Some(Value::Array(vec![match node.get("items") {
                    Some(item_node) => coerce(item_node, single),
                    None => single,
                }]))
            }
            _ => None,
        };
        if let Some(v) = coerced {
            return v;
        }
    }

    Value::String(s)
}
