//! Parameter schemas and start-time validation.
//!
//! Validation runs once when an animation starts; the per-frame path reads
//! already-validated values through the typed accessors.

use std::collections::HashMap;

use beltane_types::{ParamValue, Position};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Int,
    Bool,
    Text,
    Position,
    Positions,
}

impl ParamKind {
    fn matches(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamKind::Float, ParamValue::Float(_))
                | (ParamKind::Float, ParamValue::Int(_))
                | (ParamKind::Int, ParamValue::Int(_))
                | (ParamKind::Bool, ParamValue::Bool(_))
                | (ParamKind::Text, ParamValue::Text(_))
                | (ParamKind::Position, ParamValue::Position(_))
                | (ParamKind::Positions, ParamValue::Positions(_))
        )
    }

    fn name(&self) -> &'static str {
        match self {
            ParamKind::Float => "float",
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
            ParamKind::Text => "text",
            ParamKind::Position => "position",
            ParamKind::Positions => "positions",
        }
    }
}

/// One entry of a model's parameter schema.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind, required: true, default: None }
    }

    pub fn optional(name: &'static str, default: ParamValue) -> Self {
        let kind = match &default {
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Text(_) => ParamKind::Text,
            ParamValue::Position(_) => ParamKind::Position,
            ParamValue::Positions(_) => ParamKind::Positions,
        };
        Self { name, kind, required: false, default: Some(default) }
    }
}

/// Validated, defaulted parameter set handed to the per-frame path.
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    values: HashMap<String, ParamValue>,
}

impl ModelParams {
    /// Check `raw` against `schema`: every required entry present, every
    /// present entry of the right kind, defaults filled in. Unknown keys are
    /// kept untouched so user models can carry extra data.
    pub fn validate(
        model: &str,
        schema: &[ParamSpec],
        raw: &HashMap<String, ParamValue>,
    ) -> Result<ModelParams, EngineError> {
        let mut values = raw.clone();
        for spec in schema {
            match values.get(spec.name) {
                Some(v) => {
                    if !spec.kind.matches(v) {
                        return Err(EngineError::InvalidParameters {
                            model: model.to_string(),
                            detail: format!(
                                "'{}' expects {}, got {}",
                                spec.name,
                                spec.kind.name(),
                                v.kind_name()
                            ),
                        });
                    }
                }
                None => {
                    if spec.required {
                        return Err(EngineError::InvalidParameters {
                            model: model.to_string(),
                            detail: format!("missing required parameter '{}'", spec.name),
                        });
                    }
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.to_string(), default.clone());
                    }
                }
            }
        }
        Ok(ModelParams { values })
    }

    /// Build directly from already-complete values (tests, user models).
    pub fn from_values(values: HashMap<String, ParamValue>) -> Self {
        Self { values }
    }

    pub fn float(&self, name: &str) -> f32 {
        self.values.get(name).and_then(|v| v.as_float()).unwrap_or(0.0)
    }

    pub fn int(&self, name: &str) -> i32 {
        self.values.get(name).and_then(|v| v.as_int()).unwrap_or(0)
    }

    pub fn boolean(&self, name: &str) -> bool {
        self.values.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn text(&self, name: &str) -> &str {
        self.values.get(name).and_then(|v| v.as_text()).unwrap_or("")
    }

    pub fn position(&self, name: &str) -> Position {
        self.values
            .get(name)
            .and_then(|v| v.as_position())
            .unwrap_or(Position::ORIGIN)
    }

    pub fn positions(&self, name: &str) -> &[Position] {
        self.values
            .get(name)
            .and_then(|v| v.as_positions())
            .unwrap_or(&[])
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }
}

/// Motion plane for the planar curve models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Xy,
    Xz,
    Yz,
}

impl Plane {
    pub fn parse(s: &str) -> Plane {
        match s {
            "xz" | "XZ" => Plane::Xz,
            "yz" | "YZ" => Plane::Yz,
            _ => Plane::Xy,
        }
    }

    /// Map planar coordinates (u, v) into 3D around `center`.
    pub fn place(&self, center: Position, u: f32, v: f32) -> Position {
        match self {
            Plane::Xy => Position::new(center.x + u, center.y + v, center.z),
            Plane::Xz => Position::new(center.x + u, center.y, center.z + v),
            Plane::Yz => Position::new(center.x, center.y + u, center.z + v),
        }
    }

    /// Unit normal of the plane (the axis a helix rises along).
    pub fn normal(&self) -> Position {
        match self {
            Plane::Xy => Position::new(0.0, 0.0, 1.0),
            Plane::Xz => Position::new(0.0, 1.0, 0.0),
            Plane::Yz => Position::new(1.0, 0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("start", ParamKind::Position),
            ParamSpec::optional("radius", ParamValue::Float(5.0)),
        ]
    }

    #[test]
    fn missing_required_rejected() {
        let err = ModelParams::validate("line", &schema(), &HashMap::new()).unwrap_err();
        match err {
            EngineError::InvalidParameters { detail, .. } => {
                assert!(detail.contains("start"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut raw = HashMap::new();
        raw.insert("start".to_string(), ParamValue::Float(1.0));
        assert!(ModelParams::validate("line", &schema(), &raw).is_err());
    }

    #[test]
    fn defaults_filled() {
        let mut raw = HashMap::new();
        raw.insert("start".to_string(), ParamValue::Position(Position::ORIGIN));
        let params = ModelParams::validate("line", &schema(), &raw).unwrap();
        assert_eq!(params.float("radius"), 5.0);
    }

    #[test]
    fn int_accepted_for_float() {
        let mut raw = HashMap::new();
        raw.insert("start".to_string(), ParamValue::Position(Position::ORIGIN));
        raw.insert("radius".to_string(), ParamValue::Int(3));
        let params = ModelParams::validate("line", &schema(), &raw).unwrap();
        assert_eq!(params.float("radius"), 3.0);
    }
}
