use crate::value::{parse_date, Value, ValueType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CastError {
    /// No conversion exists between the two types
    #[error("cannot cast from {from:?} to {to:?}")]
    IncompatibleTypes { from: ValueType, to: ValueType },
    /// The source text does not parse as the target type
    #[error("invalid format '{value}' for type {target_type:?}")]
    InvalidFormat { value: String, target_type: ValueType },
    /// The number does not fit the target type
    #[error("numeric overflow: '{value}' cannot fit in {target_type:?}")]
    NumericOverflow { value: String, target_type: ValueType },
}

impl Value {
    /// Convert this value to `target_type`.
    ///
    /// Facet filters arrive as strings from select boxes ("true", "45", "2024-01-15"), so string
    /// sources parse into every other type. Numbers convert within the numeric family, and every
    /// type renders to a string.
    pub fn cast_to(&self, target_type: ValueType) -> Result<Value, CastError> {
        let source_type = ValueType::of(self);
        if source_type == target_type {
            return Ok(self.clone());
        }

        match (self, target_type) {
            (value, ValueType::String) => Ok(Value::String(value.to_string())),

            (Value::String(s), ValueType::Bool) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(CastError::InvalidFormat { value: s.clone(), target_type }),
            },
            (Value::String(s), ValueType::I64) => {
                s.trim().parse::<i64>().map(Value::I64).map_err(|_| CastError::InvalidFormat { value: s.clone(), target_type })
            }
            (Value::String(s), ValueType::F64) => {
                s.trim().parse::<f64>().map(Value::F64).map_err(|_| CastError::InvalidFormat { value: s.clone(), target_type })
            }
            (Value::String(s), ValueType::Date) => {
                parse_date(s).map(Value::Date).ok_or_else(|| CastError::InvalidFormat { value: s.clone(), target_type })
            }

            (Value::I64(n), ValueType::F64) => Ok(Value::F64(*n as f64)),
            (Value::F64(n), ValueType::I64) => {
                if n.is_finite() && n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    Ok(Value::I64(*n as i64))
                } else {
                    Err(CastError::NumericOverflow { value: n.to_string(), target_type })
                }
            }

            _ => Err(CastError::IncompatibleTypes { from: source_type, to: target_type }),
        }
    }
}
