//! Candidate values for hyperparameters

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GridError, Result};

/// A single candidate value in a hyperparameter space.
///
/// Serialized untagged, so plain JSON literals map directly onto it:
/// `null`, `true`, `10`, `0.1`, `"gaussian"`, `[10, 10]`, `[0.5, 1.5]`.
/// `Null` means "keep the value of the base configuration".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl HyperValue {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HyperValue::Null => "null",
            HyperValue::Bool(_) => "bool",
            HyperValue::Int(_) => "int",
            HyperValue::Float(_) => "float",
            HyperValue::Str(_) => "string",
            HyperValue::IntList(_) => "int list",
            HyperValue::FloatList(_) => "float list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HyperValue::Null)
    }

    fn mismatch(&self, name: &str, expected: &str) -> GridError {
        GridError::InvalidValue {
            name: name.to_string(),
            value: self.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Read as a signed integer
    pub fn as_i64(&self, name: &str) -> Result<i64> {
        match self {
            HyperValue::Int(v) => Ok(*v),
            HyperValue::Float(v)
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 =>
            {
                Ok(*v as i64)
            }
            _ => Err(self.mismatch(name, "int")),
        }
    }

    /// Read as a non-negative integer
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        let v = self.as_i64(name)?;
        usize::try_from(v).map_err(|_| self.mismatch(name, "non-negative int"))
    }

    /// Read as a float; integers widen
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            HyperValue::Float(v) => Ok(*v),
            HyperValue::Int(v) => Ok(*v as f64),
            _ => Err(self.mismatch(name, "float")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            HyperValue::Bool(v) => Ok(*v),
            _ => Err(self.mismatch(name, "bool")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            HyperValue::Str(v) => Ok(v.as_str()),
            _ => Err(self.mismatch(name, "string")),
        }
    }

    pub fn as_int_list(&self, name: &str) -> Result<Vec<i64>> {
        match self {
            HyperValue::IntList(v) => Ok(v.clone()),
            _ => Err(self.mismatch(name, "int list")),
        }
    }

    /// Read as a float list; integer lists widen
    pub fn as_float_list(&self, name: &str) -> Result<Vec<f64>> {
        match self {
            HyperValue::FloatList(v) => Ok(v.clone()),
            HyperValue::IntList(v) => Ok(v.iter().map(|x| *x as f64).collect()),
            _ => Err(self.mismatch(name, "float list")),
        }
    }

    /// Append a canonical, platform independent encoding to `buf`.
    ///
    /// Equal values always produce equal bytes; `-0.0` is folded into `0.0`.
    pub fn write_canonical(&self, buf: &mut Vec<u8>) {
        fn float_bits(v: f64) -> [u8; 8] {
            let v = if v == 0.0 { 0.0 } else { v };
            v.to_bits().to_le_bytes()
        }

        match self {
            HyperValue::Null => buf.push(0),
            HyperValue::Bool(v) => {
                buf.push(1);
                buf.push(*v as u8);
            }
            HyperValue::Int(v) => {
                buf.push(2);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            HyperValue::Float(v) => {
                buf.push(3);
                buf.extend_from_slice(&float_bits(*v));
            }
            HyperValue::Str(v) => {
                buf.push(4);
                buf.extend_from_slice(&(v.len() as u64).to_le_bytes());
                buf.extend_from_slice(v.as_bytes());
            }
            HyperValue::IntList(v) => {
                buf.push(5);
                buf.extend_from_slice(&(v.len() as u64).to_le_bytes());
                for x in v {
                    buf.extend_from_slice(&x.to_le_bytes());
                }
            }
            HyperValue::FloatList(v) => {
                buf.push(6);
                buf.extend_from_slice(&(v.len() as u64).to_le_bytes());
                for x in v {
                    buf.extend_from_slice(&float_bits(*x));
                }
            }
        }
    }
}

impl fmt::Display for HyperValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperValue::Null => write!(f, "null"),
            HyperValue::Bool(v) => write!(f, "{}", v),
            HyperValue::Int(v) => write!(f, "{}", v),
            HyperValue::Float(v) => write!(f, "{}", v),
            HyperValue::Str(v) => write!(f, "{}", v),
            HyperValue::IntList(v) => write!(f, "{:?}", v),
            HyperValue::FloatList(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for HyperValue {
    fn from(v: bool) -> Self {
        HyperValue::Bool(v)
    }
}

impl From<i64> for HyperValue {
    fn from(v: i64) -> Self {
        HyperValue::Int(v)
    }
}

impl From<i32> for HyperValue {
    fn from(v: i32) -> Self {
        HyperValue::Int(v as i64)
    }
}

impl From<usize> for HyperValue {
    fn from(v: usize) -> Self {
        HyperValue::Int(v as i64)
    }
}

impl From<f64> for HyperValue {
    fn from(v: f64) -> Self {
        HyperValue::Float(v)
    }
}

impl From<&str> for HyperValue {
    fn from(v: &str) -> Self {
        HyperValue::Str(v.to_string())
    }
}

impl From<String> for HyperValue {
    fn from(v: String) -> Self {
        HyperValue::Str(v)
    }
}

impl From<Vec<i64>> for HyperValue {
    fn from(v: Vec<i64>) -> Self {
        HyperValue::IntList(v)
    }
}

impl From<Vec<f64>> for HyperValue {
    fn from(v: Vec<f64>) -> Self {
        HyperValue::FloatList(v)
    }
}

impl<T: Into<HyperValue>> From<Option<T>> for HyperValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(HyperValue::Null)
    }
}
