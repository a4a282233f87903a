//! Parameter values for compiled filters and shaders.
//!
//! A filter or shader crosses the backend boundary as a name plus a [`Dictionary`];
//! the effect catalog lives entirely in the backend.

use crate::math::{ColourbPremultiplied, Vector2f};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Heterogeneous parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Variant {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vector2(Vector2f),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Colour(ColourbPremultiplied),
    String(String),
    List(Vec<Variant>),
}

/// String-keyed parameter map passed to `compile_filter` / `compile_shader`.
pub type Dictionary = BTreeMap<String, Variant>;

impl Variant {
    /// Numeric value as `f32`, if this variant holds a number.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Float(value) => Some(value),
            Self::Int(value) => Some(value as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vector2f> for Variant {
    fn from(value: Vector2f) -> Self {
        Self::Vector2(value)
    }
}

impl From<ColourbPremultiplied> for Variant {
    fn from(value: ColourbPremultiplied) -> Self {
        Self::Colour(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Self>> for Variant {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_access() {
        assert_eq!(Variant::from(2.5_f32).as_f32(), Some(2.5));
        assert_eq!(Variant::from(3).as_f32(), Some(3.0));
        assert_eq!(Variant::from("blur").as_f32(), None);
        assert_eq!(Variant::from("blur").as_str(), Some("blur"));
    }

    #[test]
    fn dictionary_survives_json() {
        let mut params = Dictionary::new();
        params.insert("sigma".to_owned(), Variant::from(4.0_f32));
        params.insert(
            "color".to_owned(),
            Variant::from(ColourbPremultiplied::new(0, 0, 0, 128)),
        );
        params.insert(
            "stops".to_owned(),
            Variant::from(vec![Variant::from(0.0_f32), Variant::from(1.0_f32)]),
        );

        let json = serde_json::to_string(&params).unwrap_or_default();
        let parsed: Dictionary = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(parsed, params);
    }
}
