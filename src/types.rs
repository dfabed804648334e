//! Core value types for RPGML
//!
//! This module contains the closed set of element types an array may hold
//! and the dynamically-typed [`Value`] used to move data across the
//! configuration boundary (params, constants, single-element access).
//!
//! # Main Types
//!
//! - [`Type`] - Tag enum: bool, 8/16/32/64-bit signed and unsigned integers,
//!   float, double, string, nested array, dynamic value
//! - [`Value`] - Tagged union carrying one of those types
//!
//! # Conversions
//!
//! [`Value::cast`] implements the implicit conversions used by array fills and
//! param setters. Numeric casts are range checked: a value that does not fit
//! the target integer type is an error, never wrapped. Float to integer
//! conversions truncate toward zero.

use crate::array::ArrayRef;
use crate::error::{Result, RpgmlError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Element type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// No value
    #[default]
    Nil,
    /// Boolean value
    Bool,
    /// 8-bit unsigned integer
    U8,
    /// 8-bit signed integer
    I8,
    /// 16-bit unsigned integer
    U16,
    /// 16-bit signed integer
    I16,
    /// 32-bit unsigned integer
    U32,
    /// 32-bit signed integer
    I32,
    /// 64-bit unsigned integer
    U64,
    /// 64-bit signed integer
    I64,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// UTF-8 string
    String,
    /// Nested array
    Array,
    /// Dynamically typed value
    Value,
}

impl Type {
    /// Every type that may be used as an array element type
    pub fn element_types() -> &'static [Type] {
        &[
            Type::Bool,
            Type::U8,
            Type::I8,
            Type::U16,
            Type::I16,
            Type::U32,
            Type::I32,
            Type::U64,
            Type::I64,
            Type::F32,
            Type::F64,
            Type::String,
            Type::Array,
            Type::Value,
        ]
    }

    /// Canonical name used in graph files and messages
    pub fn name(&self) -> &'static str {
        match self {
            Type::Nil => "nil",
            Type::Bool => "bool",
            Type::U8 => "uint8",
            Type::I8 => "int8",
            Type::U16 => "uint16",
            Type::I16 => "int16",
            Type::U32 => "uint32",
            Type::I32 => "int32",
            Type::U64 => "uint64",
            Type::I64 => "int64",
            Type::F32 => "float",
            Type::F64 => "double",
            Type::String => "string",
            Type::Array => "array",
            Type::Value => "value",
        }
    }

    /// Parse a canonical type name
    pub fn from_name(name: &str) -> Option<Type> {
        Type::element_types()
            .iter()
            .chain(std::iter::once(&Type::Nil))
            .copied()
            .find(|t| t.name() == name)
    }

    /// Returns true for the integer types
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::U8
                | Type::I8
                | Type::U16
                | Type::I16
                | Type::U32
                | Type::I32
                | Type::U64
                | Type::I64
        )
    }

    /// Returns true for float and double
    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    /// Returns true for bool, integer and float types
    pub fn is_scalar(&self) -> bool {
        *self == Type::Bool || self.is_integer() || self.is_float()
    }

    /// Size in bytes of one element, for scalar types
    pub fn size_bytes(&self) -> Option<usize> {
        match self {
            Type::Bool | Type::U8 | Type::I8 => Some(1),
            Type::U16 | Type::I16 => Some(2),
            Type::U32 | Type::I32 | Type::F32 => Some(4),
            Type::U64 | Type::I64 | Type::F64 => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dynamically typed value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    String(Arc<str>),
    Array(ArrayRef),
}

/// Intermediate numeric form used by casts.
enum Num {
    Int(i128),
    Float(f64),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// The type tag of this value
    pub fn get_type(&self) -> Type {
        match self {
            Value::Nil => Type::Nil,
            Value::Bool(_) => Type::Bool,
            Value::U8(_) => Type::U8,
            Value::I8(_) => Type::I8,
            Value::U16(_) => Type::U16,
            Value::I16(_) => Type::I16,
            Value::U32(_) => Type::U32,
            Value::I32(_) => Type::I32,
            Value::U64(_) => Type::U64,
            Value::I64(_) => Type::I64,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
            Value::String(_) => Type::String,
            Value::Array(_) => Type::Array,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    fn as_num(&self) -> Option<Num> {
        Some(match self {
            Value::Bool(v) => Num::Int(i128::from(*v)),
            Value::U8(v) => Num::Int(i128::from(*v)),
            Value::I8(v) => Num::Int(i128::from(*v)),
            Value::U16(v) => Num::Int(i128::from(*v)),
            Value::I16(v) => Num::Int(i128::from(*v)),
            Value::U32(v) => Num::Int(i128::from(*v)),
            Value::I32(v) => Num::Int(i128::from(*v)),
            Value::U64(v) => Num::Int(i128::from(*v)),
            Value::I64(v) => Num::Int(i128::from(*v)),
            Value::F32(v) => Num::Float(f64::from(*v)),
            Value::F64(v) => Num::Float(*v),
            _ => return None,
        })
    }

    /// Numeric view as f64 (bool maps to 0/1)
    pub fn to_f64(&self) -> Option<f64> {
        self.as_num().map(|n| match n {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        })
    }

    /// Integer view; floats must be integral
    pub fn to_i64(&self) -> Option<i64> {
        match self.as_num()? {
            Num::Int(i) => i64::try_from(i).ok(),
            Num::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                // i64::MAX as f64 rounds up to 2^63, which is out of range
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
            Num::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to `target`, applying the implicit numeric conversions.
    pub fn cast(&self, target: Type) -> Result<Value> {
        let actual = self.get_type();
        if actual == target || target == Type::Value {
            return Ok(self.clone());
        }

        let mismatch = || RpgmlError::TypeMismatch {
            expected: target,
            actual,
        };

        if !target.is_scalar() {
            return Err(mismatch());
        }
        let num = self.as_num().ok_or_else(mismatch)?;

        if target == Type::Bool {
            return Ok(Value::Bool(match num {
                Num::Int(i) => i != 0,
                Num::Float(f) => f != 0.0,
            }));
        }

        if target.is_float() {
            let f = match num {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            return Ok(if target == Type::F32 {
                let narrowed = f as f32;
                if f.is_finite() && !narrowed.is_finite() {
                    return Err(self.overflow(target));
                }
                Value::F32(narrowed)
            } else {
                Value::F64(f)
            });
        }

        let int = match num {
            Num::Int(i) => i,
            Num::Float(f) => {
                if !f.is_finite() || f.abs() >= 2f64.powi(100) {
                    return Err(self.overflow(target));
                }
                f.trunc() as i128
            }
        };

        let out = match target {
            Type::U8 => u8::try_from(int).ok().map(Value::U8),
            Type::I8 => i8::try_from(int).ok().map(Value::I8),
            Type::U16 => u16::try_from(int).ok().map(Value::U16),
            Type::I16 => i16::try_from(int).ok().map(Value::I16),
            Type::U32 => u32::try_from(int).ok().map(Value::U32),
            Type::I32 => i32::try_from(int).ok().map(Value::I32),
            Type::U64 => u64::try_from(int).ok().map(Value::U64),
            Type::I64 => i64::try_from(int).ok().map(Value::I64),
            _ => None,
        };
        out.ok_or_else(|| self.overflow(target))
    }

    fn overflow(&self, target: Type) -> RpgmlError {
        RpgmlError::Conversion {
            value: self.to_string(),
            target,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (a, b) if a.get_type() == b.get_type() => match (a.as_num(), b.as_num()) {
                (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
                (Some(Num::Float(x)), Some(Num::Float(y))) => x == y,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Array(a) => write!(f, "<{} array {}>", a.elem_type(), a.size()),
        }
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool, u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64,
    ArrayRef => Array,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}
