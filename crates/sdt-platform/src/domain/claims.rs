//! Verified Claims
//!
//! Request-scoped view of a validated bearer token payload. The payload is
//! weakly typed JSON, so it is converted once at the boundary into a small
//! variant-typed map and read through typed accessors only.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ServiceError;

/// Claim carrying the identity id issued by the identity service
pub const IDENTITY_CLAIM: &str = "uid";

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
    /// Arrays and nested objects; never read by the tracker
    Structured(Value),
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ClaimValue::Null,
            Value::Bool(b) => ClaimValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ClaimValue::Integer(i),
                // u64 above i64::MAX falls through to f64 and fails the range check
                None => ClaimValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ClaimValue::Text(s),
            other => ClaimValue::Structured(other),
        }
    }
}

impl ClaimValue {
    fn kind(&self) -> &'static str {
        match self {
            ClaimValue::Integer(_) => "integer",
            ClaimValue::Float(_) => "float",
            ClaimValue::Text(_) => "string",
            ClaimValue::Bool(_) => "bool",
            ClaimValue::Null => "null",
            ClaimValue::Structured(_) => "structured",
        }
    }

    /// Integral numeric value. Floats qualify only when finite, whole and in range.
    fn as_integral(&self) -> Option<i64> {
        match *self {
            ClaimValue::Integer(i) => Some(i),
            ClaimValue::Float(f)
                if f.is_finite()
                    && f.fract() == 0.0
                    && f >= i64::MIN as f64
                    && f < i64::MAX as f64 =>
            {
                Some(f as i64)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedClaims {
    entries: HashMap<String, ClaimValue>,
}

impl VerifiedClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ClaimValue) -> Self {
        self.entries.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.entries.get(name)
    }

    /// Numeric claim by name.
    ///
    /// Absent or wrongly shaped claims are an invalid credential, never a
    /// server error.
    pub fn numeric(&self, name: &str) -> Result<i64, ServiceError> {
        let value = self
            .entries
            .get(name)
            .ok_or_else(|| ServiceError::invalid_credential(format!("missing {} claim", name)))?;

        value.as_integral().ok_or_else(|| {
            ServiceError::invalid_credential(format!(
                "claim {} has incorrect type {}",
                name,
                value.kind()
            ))
        })
    }
}

impl From<serde_json::Map<String, Value>> for VerifiedClaims {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, ClaimValue::from(v))).collect(),
        }
    }
}
