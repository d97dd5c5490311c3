//! Value domain for query parameters and result records

use crate::{Error, Result};
use std::collections::HashMap;

/// A value as carried over the wire.
///
/// The parameter set accepted by [`run`](crate::Session::run) is the closed
/// set null / boolean / integer / float / string / list / map. `Bytes` can
/// appear in records decoded from the server but is rejected as a parameter
/// before any network I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw byte array (decode-only; not a valid parameter)
    Bytes(Vec<u8>),
    /// Ordered list of values
    List(Vec<Value>),
    /// String-keyed map of values
    Map(HashMap<String, Value>),
}

impl Value {
    /// Short kind name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Integer accessor
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// String accessor
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Validate this value as a query parameter.
    ///
    /// Rejects `Bytes` anywhere in the structure. Runs before encoding so a
    /// bad parameter never causes a partial write.
    pub fn validate_parameter(&self) -> Result<()> {
        match self {
            Value::Bytes(_) => Err(Error::UnsupportedType(
                "byte arrays are not valid query parameters".into(),
            )),
            Value::List(items) => {
                for item in items {
                    item.validate_parameter()?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for value in entries.values() {
                    value.validate_parameter()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    /// Convert a JSON value into a driver value.
    ///
    /// Fails with `UnsupportedType` for numbers that fit neither `i64` nor
    /// `f64` exactly (e.g. `u64` above `i64::MAX`).
    fn try_from(v: serde_json::Value) -> Result<Self> {
        Ok(match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_u64() {
                    // A u64 above i64::MAX would pass as_f64 and silently
                    // lose precision; integers stay exact or get rejected
                    return Err(Error::UnsupportedType(format!(
                        "integer {} exceeds the signed 64-bit range",
                        n
                    )));
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    return Err(Error::UnsupportedType(format!(
                        "number {} does not fit a 64-bit integer or float",
                        n
                    )));
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k, Value::try_from(v)?);
                }
                Value::Map(map)
            }
        })
    }
}

/// Query parameters: a string-keyed map validated before encoding
pub type Params = HashMap<String, Value>;

/// Validate a full parameter map before any network I/O
pub fn validate_params(params: &Params) -> Result<()> {
    for (name, value) in params {
        value.validate_parameter().map_err(|e| match e {
            Error::UnsupportedType(msg) => {
                Error::UnsupportedType(format!("parameter '{}': {}", name, msg))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// One row of query output: values in field order, with field names shared
/// across all records of the same result stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: std::sync::Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Record {
    /// Build a record from shared field names and positional values
    pub fn new(fields: std::sync::Arc<Vec<String>>, values: Vec<Value>) -> Self {
        Self { fields, values }
    }

    /// Field names, in position order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Positional access
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Access by field name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let idx = self.fields.iter().position(|f| f == name)?;
        self.values.get(idx)
    }

    /// All values, in position order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scalar_params_validate() {
        let mut params = Params::new();
        params.insert("n".into(), Value::Integer(1));
        params.insert("name".into(), Value::from("alice"));
        params.insert("score".into(), Value::Float(0.5));
        params.insert("missing".into(), Value::Null);
        assert!(validate_params(&params).is_ok());
    }

    #[test]
    fn test_bytes_param_rejected() {
        let mut params = Params::new();
        params.insert("blob".into(), Value::Bytes(vec![1, 2, 3]));
        let err = validate_params(&params).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
        assert!(err.to_string().contains("blob"));
    }

    #[test]
    fn test_nested_bytes_rejected() {
        let mut inner = HashMap::new();
        inner.insert("payload".to_string(), Value::Bytes(vec![0xff]));
        let mut params = Params::new();
        params.insert(
            "wrapper".into(),
            Value::List(vec![Value::Integer(1), Value::Map(inner)]),
        );
        assert!(matches!(
            validate_params(&params),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({
            "name": "alice",
            "age": 42,
            "tags": ["a", "b"],
            "extra": null,
        });
        let value = Value::try_from(json).unwrap();
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["age"], Value::Integer(42));
        assert_eq!(
            map["tags"],
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(map["extra"], Value::Null);
    }

    #[test]
    fn test_json_u64_overflow_rejected() {
        // u64::MAX has no exact i64 representation and must not be silently
        // widened to a lossy Float
        let err = Value::try_from(serde_json::json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));

        let err = Value::try_from(serde_json::json!(i64::MAX as u64 + 1)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));

        // The i64 boundary itself stays an exact integer
        let value = Value::try_from(serde_json::json!(i64::MAX)).unwrap();
        assert_eq!(value, Value::Integer(i64::MAX));
    }

    #[test]
    fn test_record_access() {
        let fields = Arc::new(vec!["id".to_string(), "name".to_string()]);
        let record = Record::new(fields, vec![Value::Integer(7), Value::from("bob")]);
        assert_eq!(record.get(0), Some(&Value::Integer(7)));
        assert_eq!(record.get_by_name("name"), Some(&Value::from("bob")));
        assert_eq!(record.get_by_name("nope"), None);
        assert_eq!(record.len(), 2);
    }
}
