use std::fmt::{self, Debug};
use std::marker::PhantomData;

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::Error;

/// Describes and validates the arguments of a tool.
///
/// The definition is advertised to the model, and every raw argument value
/// requested by the model goes through [`Schema::validate`] before the tool
/// runs. Different tools may use different schema engines.
pub trait Schema: Send + Sync + 'static {
    /// The validated (and possibly coerced) arguments.
    type Output: Send + 'static;

    /// Returns the JSON schema of the arguments.
    fn definition(&self) -> &Value;

    /// Validates the raw arguments.
    ///
    /// Failures must be reported with
    /// [`ErrorKind::InvalidInput`](super::ErrorKind::InvalidInput).
    fn validate(&self, arguments: Value) -> Result<Self::Output, Error>;
}

/// A schema derived from a Rust type.
///
/// The definition is generated with `schemars`, and arguments are validated
/// by deserializing them into `T`.
pub struct TypedSchema<T> {
    definition: Value,
    _marker: PhantomData<fn() -> T>,
}

impl<T: JsonSchema + DeserializeOwned> TypedSchema<T> {
    /// Creates a schema for `T`.
    #[inline]
    pub fn new() -> Self {
        Self {
            definition: schema_for!(T).to_value(),
            _marker: PhantomData,
        }
    }
}

impl<T: JsonSchema + DeserializeOwned> Default for TypedSchema<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSchema")
            .field("definition", &self.definition)
            .finish()
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: JsonSchema + DeserializeOwned + Send + 'static,
{
    type Output = T;

    #[inline]
    fn definition(&self) -> &Value {
        &self.definition
    }

    fn validate(&self, arguments: Value) -> Result<T, Error> {
        // Some models send `null` for tools without parameters.
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            arguments => arguments,
        };
        serde_json::from_value(arguments)
            .map_err(|err| Error::invalid_input().with_reason(err.to_string()))
    }
}

/// A schema given as a raw JSON schema object.
///
/// Only the commonly used subset is checked: the arguments must be an
/// object, `required` properties must be present, declared properties must
/// match their primitive `type`, and unknown properties are rejected when
/// `additionalProperties` is `false`. The arguments are passed through as-is.
#[derive(Clone, Debug)]
pub struct ObjectSchema {
    definition: Value,
}

impl ObjectSchema {
    /// Creates a schema from its JSON definition.
    #[inline]
    pub fn new(definition: Value) -> Self {
        Self { definition }
    }

    fn check_object(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<(), String> {
        let required = self
            .definition
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for name in required {
            if !arguments.contains_key(name) {
                return Err(format!("missing required property `{name}`"));
            }
        }

        let properties = self
            .definition
            .get("properties")
            .and_then(Value::as_object);
        let closed = self.definition.get("additionalProperties")
            == Some(&Value::Bool(false));
        for (name, value) in arguments {
            let Some(property) = properties.and_then(|p| p.get(name)) else {
                if closed {
                    return Err(format!("unexpected property `{name}`"));
                }
                continue;
            };
            let Some(expected) = property.get("type") else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(format!(
                    "property `{name}` should be of type {expected}, got {}",
                    type_name(value)
                ));
            }
        }
        Ok(())
    }
}

impl Schema for ObjectSchema {
    type Output = Value;

    #[inline]
    fn definition(&self) -> &Value {
        &self.definition
    }

    fn validate(&self, arguments: Value) -> Result<Value, Error> {
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            arguments => arguments,
        };
        let Value::Object(object) = &arguments else {
            return Err(Error::invalid_input().with_reason(format!(
                "expected an object, got {}",
                type_name(&arguments)
            )));
        };
        self.check_object(object)
            .map_err(|reason| Error::invalid_input().with_reason(reason))?;
        Ok(arguments)
    }
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => primitive_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| primitive_matches(name, value)),
        // Unknown shapes are not checked.
        _ => true,
    }
}

fn primitive_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
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
