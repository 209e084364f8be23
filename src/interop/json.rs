//! JSON bridging for `Value`
//!
//! Used by the command-line front end to accept arguments and print results.
//! Only the JSON-shaped subset of `Value` converts; everything else is
//! `UnsupportedType`.

use serde_json::{Map, Number};

use super::value::Value;
use crate::error::{Error, Result};

impl Value {
    /// Arrays become `Seq`, objects become `Map` with text keys.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => from_number(&n),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::Seq(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(fields) => Self::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (Self::Str(k), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::None => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::UInt(u) => serde_json::Value::from(*u),
            Self::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| unsupported(format!("non-finite float {}", f)))?,
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Seq(items) => serde_json::Value::Array(
                items.iter().map(Self::to_json).collect::<Result<_>>()?,
            ),
            Self::Map(pairs) => {
                let mut fields = Map::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = match key {
                        Self::Str(s) => s.clone(),
                        other => {
                            return Err(unsupported(format!(
                                "{} mapping key",
                                other.kind_name()
                            )))
                        }
                    };
                    fields.insert(key, value.to_json()?);
                }
                serde_json::Value::Object(fields)
            }
            Self::Complex(..) | Self::Bytes(_) | Self::Object(_) => {
                return Err(unsupported(self.kind_name().to_string()))
            }
        })
    }
}

fn from_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else if let Some(u) = n.as_u64() {
        Value::UInt(u)
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn unsupported(what: String) -> Error {
    Error::UnsupportedType(format!("{} has no JSON form", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_shapes() {
        let value = Value::from_json(json!({"a": [1, -2, 2.5], "b": null, "c": "x"}));
        assert_eq!(
            value.get(&Value::from("a")),
            Some(&Value::Seq(vec![Value::Int(1), Value::Int(-2), Value::Float(2.5)]))
        );
        assert_eq!(value.get(&Value::from("b")), Some(&Value::None));
        assert_eq!(value.get(&Value::from("c")), Some(&Value::from("x")));
    }

    #[test]
    fn test_large_unsigned() {
        assert_eq!(Value::from_json(json!(u64::MAX)), Value::UInt(u64::MAX));
        assert_eq!(Value::UInt(u64::MAX).to_json().unwrap(), json!(u64::MAX));
    }

    #[test]
    fn test_to_json_rejects() {
        assert!(matches!(
            Value::Complex(1.0, 2.0).to_json(),
            Err(Error::UnsupportedType(_))
        ));
        assert!(matches!(Value::bytes(b"ab".to_vec()).to_json(), Err(Error::UnsupportedType(_))));
        assert!(matches!(Value::Float(f64::NAN).to_json(), Err(Error::UnsupportedType(_))));
        assert!(matches!(
            Value::map([(1, 2)]).to_json(),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_to_json_nested() {
        let value = Value::map([("k", Value::from(vec![true, false]))]);
        assert_eq!(value.to_json().unwrap(), json!({"k": [true, false]}));
    }
}
