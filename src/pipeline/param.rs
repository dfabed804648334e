//! Param tables.
//!
//! Each node type declares its params in a static `ParamSpec` table mapping
//! a name to a setter. Setters validate their value and return an error
//! rather than coerce past the implicit numeric casts of [`Value::cast`].
//!
//! Indexed params are param arrays: every element is set with its index.
//! Setting an indexed param from an array value sets each element in turn.

use crate::error::{Result, RpgmlError};
use crate::types::{Type, Value};

/// Setter invoked when a param value is assigned.
pub type ParamSetter<N> = fn(&mut N, Option<usize>, &Value) -> Result<()>;

/// Static descriptor of one param of node type `N`.
pub struct ParamSpec<N> {
    pub name: &'static str,
    pub indexed: bool,
    pub set: ParamSetter<N>,
}

impl<N> ParamSpec<N> {
    pub const fn scalar(name: &'static str, set: ParamSetter<N>) -> Self {
        Self {
            name,
            indexed: false,
            set,
        }
    }

    pub const fn indexed(name: &'static str, set: ParamSetter<N>) -> Self {
        Self {
            name,
            indexed: true,
            set,
        }
    }
}

/// Route a param assignment through `table`.
pub fn dispatch<N>(
    table: &[ParamSpec<N>],
    node: &mut N,
    name: &str,
    index: Option<usize>,
    value: &Value,
) -> Result<()> {
    let spec = table
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| RpgmlError::InvalidArgument(format!("unknown param '{}'", name)))?;

    match (spec.indexed, index) {
        (false, Some(i)) => Err(RpgmlError::InvalidArgument(format!(
            "param '{}' is not indexed, got index {}",
            name, i
        ))),
        (true, None) => match value.as_array() {
            Some(array) => {
                for (i, element) in array.to_values().iter().enumerate() {
                    (spec.set)(node, Some(i), element)?;
                }
                Ok(())
            }
            None => (spec.set)(node, Some(0), value),
        },
        _ => (spec.set)(node, index, value),
    }
}

/// Names declared in `table`.
pub fn names<N>(table: &[ParamSpec<N>]) -> Vec<&'static str> {
    table.iter().map(|p| p.name).collect()
}

/// Read an integer param value, rejecting non-integral input.
pub fn expect_int(value: &Value) -> Result<i64> {
    value.to_i64().ok_or(RpgmlError::TypeMismatch {
        expected: Type::I64,
        actual: value.get_type(),
    })
}

/// Read a non-negative integer param value.
pub fn expect_usize(value: &Value) -> Result<usize> {
    let i = expect_int(value)?;
    usize::try_from(i).map_err(|_| RpgmlError::Conversion {
        value: value.to_string(),
        target: Type::U64,
    })
}

pub fn expect_str(value: &Value) -> Result<&str> {
    value.as_str().ok_or(RpgmlError::TypeMismatch {
        expected: Type::String,
        actual: value.get_type(),
    })
}
