use serde::{Deserialize, Serialize};

use crate::Position;

/// A motion-model parameter value. Specs carry these keyed by parameter name;
/// the model registry validates them against the model's schema at start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Text(String),
    Position(Position),
    /// Control-point lists (Catmull-Rom, Bezier paths).
    Positions(Vec<Position>),
}

impl ParamValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Position> {
        match self {
            ParamValue::Position(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_positions(&self) -> Option<&[Position]> {
        match self {
            ParamValue::Positions(v) => Some(v),
            _ => None,
        }
    }

    /// Kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::Text(_) => "text",
            ParamValue::Position(_) => "position",
            ParamValue::Positions(_) => "positions",
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Position> for ParamValue {
    fn from(v: Position) -> Self {
        ParamValue::Position(v)
    }
}
