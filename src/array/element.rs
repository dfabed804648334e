//! Element trait binding each concrete element type to its [`Type`] tag and
//! to its [`ArrayBase`] variant.

use crate::array::{Array, ArrayBase, ArrayRef};
use crate::error::{Result, RpgmlError};
use crate::types::{Type, Value};
use std::fmt::Debug;

/// Element type of a nested-array array.
pub type Nested = Option<ArrayRef>;

/// A type that can be stored in an [`Array`].
pub trait Element: Clone + Default + Debug + Send + Sync + 'static {
    const TYPE: Type;

    /// Convert a dynamic value, applying the implicit numeric casts.
    fn from_value(value: &Value) -> Result<Self>;

    fn to_value(&self) -> Value;

    fn into_base(array: Array<Self>) -> ArrayBase;

    fn from_base(base: &ArrayBase) -> Option<&Array<Self>>;

    fn from_base_mut(base: &mut ArrayBase) -> Option<&mut Array<Self>>;
}

macro_rules! impl_scalar_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const TYPE: Type = Type::$variant;

                fn from_value(value: &Value) -> Result<Self> {
                    match value.cast(Type::$variant)? {
                        Value::$variant(v) => Ok(v),
                        other => Err(RpgmlError::TypeMismatch {
                            expected: Type::$variant,
                            actual: other.get_type(),
                        }),
                    }
                }

                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn into_base(array: Array<Self>) -> ArrayBase {
                    ArrayBase::$variant(array)
                }

                fn from_base(base: &ArrayBase) -> Option<&Array<Self>> {
                    match base {
                        ArrayBase::$variant(a) => Some(a),
                        _ => None,
                    }
                }

                fn from_base_mut(base: &mut ArrayBase) -> Option<&mut Array<Self>> {
                    match base {
                        ArrayBase::$variant(a) => Some(a),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_scalar_element!(
    bool => Bool, u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64,
);

impl Element for String {
    const TYPE: Type = Type::String;

    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or(RpgmlError::TypeMismatch {
                expected: Type::String,
                actual: value.get_type(),
            })
    }

    fn to_value(&self) -> Value {
        Value::string(self)
    }

    fn into_base(array: Array<Self>) -> ArrayBase {
        ArrayBase::String(array)
    }

    fn from_base(base: &ArrayBase) -> Option<&Array<Self>> {
        match base {
            ArrayBase::String(a) => Some(a),
            _ => None,
        }
    }

    fn from_base_mut(base: &mut ArrayBase) -> Option<&mut Array<Self>> {
        match base {
            ArrayBase::String(a) => Some(a),
            _ => None,
        }
    }
}

impl Element for Nested {
    const TYPE: Type = Type::Array;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(a) => Ok(Some(a.clone())),
            Value::Nil => Ok(None),
            other => Err(RpgmlError::TypeMismatch {
                expected: Type::Array,
                actual: other.get_type(),
            }),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Some(a) => Value::Array(a.clone()),
            None => Value::Nil,
        }
    }

    fn into_base(array: Array<Self>) -> ArrayBase {
        ArrayBase::Array(array)
    }

    fn from_base(base: &ArrayBase) -> Option<&Array<Self>> {
        match base {
            ArrayBase::Array(a) => Some(a),
            _ => None,
        }
    }

    fn from_base_mut(base: &mut ArrayBase) -> Option<&mut Array<Self>> {
        match base {
            ArrayBase::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl Element for Value {
    const TYPE: Type = Type::Value;

    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn into_base(array: Array<Self>) -> ArrayBase {
        ArrayBase::Value(array)
    }

    fn from_base(base: &ArrayBase) -> Option<&Array<Self>> {
        match base {
            ArrayBase::Value(a) => Some(a),
            _ => None,
        }
    }

    fn from_base_mut(base: &mut ArrayBase) -> Option<&mut Array<Self>> {
        match base {
            ArrayBase::Value(a) => Some(a),
            _ => None,
        }
    }
}
