//! Engine parameter declarations and per-request validation.
//!
//! Engines declare what they accept as [`ParamSpec`] tables; callers send
//! sparse overrides; [`resolve`] merges the two under validation so engine
//! code only ever sees complete, in-range parameter sets.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interface::TtsError;

/// Declaration of one tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSpec {
    Float {
        default: f64,
        min: f64,
        max: f64,
        description: String,
    },
    Int {
        default: i64,
        min: i64,
        max: i64,
        description: String,
    },
    Enum {
        default: String,
        options: Vec<String>,
        description: String,
    },
}

impl ParamSpec {
    pub fn float(default: f64, min: f64, max: f64, description: impl Into<String>) -> Self {
        ParamSpec::Float {
            default,
            min,
            max,
            description: description.into(),
        }
    }

    pub fn int(default: i64, min: i64, max: i64, description: impl Into<String>) -> Self {
        ParamSpec::Int {
            default,
            min,
            max,
            description: description.into(),
        }
    }

    pub fn choice(
        default: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        description: impl Into<String>,
    ) -> Self {
        ParamSpec::Enum {
            default: default.into(),
            options: options.into_iter().map(Into::into).collect(),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ParamSpec::Float { description, .. }
            | ParamSpec::Int { description, .. }
            | ParamSpec::Enum { description, .. } => description,
        }
    }

    pub fn default_value(&self) -> ParamValue {
        match self {
            ParamSpec::Float { default, .. } => ParamValue::Float(*default),
            ParamSpec::Int { default, .. } => ParamValue::Int(*default),
            ParamSpec::Enum { default, .. } => ParamValue::Text(default.clone()),
        }
    }

    /// Check `value` against this spec. Ok carries the value to store,
    /// normalized to the declared type (ints widen for float specs).
    pub fn validate(&self, name: &str, value: &ParamValue) -> Result<ParamValue, TtsError> {
        match self {
            ParamSpec::Float { min, max, .. } => {
                let v = match value {
                    ParamValue::Float(v) => *v,
                    ParamValue::Int(i) => *i as f64,
                    ParamValue::Text(_) => return Err(type_mismatch(name, value, "<float>")),
                };
                if !v.is_finite() || v < *min || v > *max {
                    return Err(TtsError::ParameterOutOfRange {
                        name: name.to_string(),
                        value: v,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(ParamValue::Float(v))
            }
            ParamSpec::Int { min, max, .. } => {
                let v = match value {
                    ParamValue::Int(i) => *i,
                    _ => return Err(type_mismatch(name, value, "<integer>")),
                };
                if v < *min || v > *max {
                    return Err(TtsError::ParameterOutOfRange {
                        name: name.to_string(),
                        value: v as f64,
                        min: *min as f64,
                        max: *max as f64,
                    });
                }
                Ok(ParamValue::Int(v))
            }
            ParamSpec::Enum { options, .. } => {
                let v = match value {
                    ParamValue::Text(s) => s,
                    _ => return Err(type_mismatch(name, value, "<string>")),
                };
                if !options.iter().any(|o| o == v) {
                    return Err(TtsError::InvalidOption {
                        name: name.to_string(),
                        value: v.clone(),
                        options: options.clone(),
                    });
                }
                Ok(ParamValue::Text(v.clone()))
            }
        }
    }
}

// Type mismatches reuse InvalidOption with a type marker as the allowed set.
fn type_mismatch(name: &str, value: &ParamValue, expected: &str) -> TtsError {
    TtsError::InvalidOption {
        name: name.to_string(),
        value: value.to_string(),
        options: vec![expected.to_string()],
    }
}

/// A caller-supplied or resolved parameter value.
///
/// Untagged, with `Int` first so whole JSON numbers stay integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v as f64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Validated parameter set: exactly the declared keys, every value in range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedParams(BTreeMap<String, ParamValue>);

impl ResolvedParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Float value, widening a stored int.
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Text(_) => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            ParamValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merge overrides into the declared defaults under validation.
///
/// Unknown names are rejected first, then values are checked in sorted key
/// order; the first violation aborts resolution. No engine code runs here.
pub fn resolve(
    engine: &str,
    specs: &BTreeMap<String, ParamSpec>,
    overrides: &HashMap<String, ParamValue>,
) -> Result<ResolvedParams, TtsError> {
    let mut names: Vec<&String> = overrides.keys().collect();
    names.sort();
    for name in names {
        if !specs.contains_key(name.as_str()) {
            return Err(TtsError::UnknownParameter {
                engine: engine.to_string(),
                name: name.clone(),
            });
        }
    }

    let mut resolved = BTreeMap::new();
    for (name, spec) in specs {
        let value = match overrides.get(name) {
            Some(v) => spec.validate(name, v)?,
            None => spec.default_value(),
        };
        resolved.insert(name.clone(), value);
    }
    Ok(ResolvedParams(resolved))
}
