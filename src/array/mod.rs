//! N-dimensional array engine.
//!
//! [`Array<T>`] is a strided view over reference counted storage of one
//! element type. [`ArrayBase`] erases the element type behind a closed enum so
//! ports and values can carry any array; nodes recover the concrete type with
//! [`ArrayBase::get_as`] before running tight loops.
//!
//! # Type dispatch
//!
//! Every algorithm that depends on the element type goes through one of two
//! macros instead of a hand-written match:
//!
//! - [`dispatch_array!`] binds the typed array inside an `ArrayBase`
//! - [`with_element_type!`] binds a type alias for a runtime [`Type`] tag

mod element;
mod iter;
mod size;
mod typed;

pub use element::{Element, Nested};
pub use iter::StridedIter;
pub use size::{Coordinates, Size, MAX_DIMS};
pub use typed::{Array, ArrayData};

use crate::error::{Result, RpgmlError};
use crate::types::{Type, Value};
use std::sync::Arc;

/// Shared handle to a published, type-erased array.
pub type ArrayRef = Arc<ArrayBase>;

/// Run `$body` with `$a` bound to the typed array inside an [`ArrayBase`].
macro_rules! dispatch_array {
    ($base:expr, $a:ident => $body:expr) => {
        match $base {
            $crate::array::ArrayBase::Bool($a) => $body,
            $crate::array::ArrayBase::U8($a) => $body,
            $crate::array::ArrayBase::I8($a) => $body,
            $crate::array::ArrayBase::U16($a) => $body,
            $crate::array::ArrayBase::I16($a) => $body,
            $crate::array::ArrayBase::U32($a) => $body,
            $crate::array::ArrayBase::I32($a) => $body,
            $crate::array::ArrayBase::U64($a) => $body,
            $crate::array::ArrayBase::I64($a) => $body,
            $crate::array::ArrayBase::F32($a) => $body,
            $crate::array::ArrayBase::F64($a) => $body,
            $crate::array::ArrayBase::String($a) => $body,
            $crate::array::ArrayBase::Array($a) => $body,
            $crate::array::ArrayBase::Value($a) => $body,
        }
    };
}

/// Run `$body` with `$T` aliased to the element type named by a [`Type`].
/// `Type::Nil` has no element type and evaluates `$fallback`.
macro_rules! with_element_type {
    ($ty:expr, $T:ident => $body:expr, else $fallback:expr) => {
        match $ty {
            $crate::types::Type::Bool => {
                type $T = bool;
                $body
            }
            $crate::types::Type::U8 => {
                type $T = u8;
                $body
            }
            $crate::types::Type::I8 => {
                type $T = i8;
                $body
            }
            $crate::types::Type::U16 => {
                type $T = u16;
                $body
            }
            $crate::types::Type::I16 => {
                type $T = i16;
                $body
            }
            $crate::types::Type::U32 => {
                type $T = u32;
                $body
            }
            $crate::types::Type::I32 => {
                type $T = i32;
                $body
            }
            $crate::types::Type::U64 => {
                type $T = u64;
                $body
            }
            $crate::types::Type::I64 => {
                type $T = i64;
                $body
            }
            $crate::types::Type::F32 => {
                type $T = f32;
                $body
            }
            $crate::types::Type::F64 => {
                type $T = f64;
                $body
            }
            $crate::types::Type::String => {
                type $T = ::std::string::String;
                $body
            }
            $crate::types::Type::Array => {
                type $T = $crate::array::Nested;
                $body
            }
            $crate::types::Type::Value => {
                type $T = $crate::types::Value;
                $body
            }
            $crate::types::Type::Nil => $fallback,
        }
    };
}

pub(crate) use dispatch_array;
pub(crate) use with_element_type;

/// Type-erased array: one variant per element type.
#[derive(Debug, Clone)]
pub enum ArrayBase {
    Bool(Array<bool>),
    U8(Array<u8>),
    I8(Array<i8>),
    U16(Array<u16>),
    I16(Array<i16>),
    U32(Array<u32>),
    I32(Array<i32>),
    U64(Array<u64>),
    I64(Array<i64>),
    F32(Array<f32>),
    F64(Array<f64>),
    String(Array<String>),
    Array(Array<Nested>),
    Value(Array<Value>),
}

impl<T: Element> From<Array<T>> for ArrayBase {
    fn from(array: Array<T>) -> Self {
        T::into_base(array)
    }
}

fn nil_element() -> RpgmlError {
    RpgmlError::InvalidArgument("nil is not an array element type".to_string())
}

impl ArrayBase {
    /// Default-initialized contiguous array of `ty` elements.
    pub fn new(ty: Type, size: Size) -> Result<Self> {
        with_element_type!(ty, T => Ok(Array::<T>::new(size).into()), else Err(nil_element()))
    }

    /// Zero-dimensional array holding `value`, typed after the value.
    pub fn scalar(value: &Value) -> Result<Self> {
        with_element_type!(
            value.get_type(),
            T => Ok(Array::<T>::scalar(T::from_value(value)?).into()),
            else Err(nil_element())
        )
    }

    /// Build a `ty` array of `size` from values in logical order.
    pub fn from_values(ty: Type, size: Size, values: &[Value]) -> Result<Self> {
        with_element_type!(
            ty,
            T => {
                let elements = values
                    .iter()
                    .map(T::from_value)
                    .collect::<Result<Vec<T>>>()?;
                Ok(Array::<T>::from_vec(size, elements)?.into())
            },
            else Err(nil_element())
        )
    }

    pub fn elem_type(&self) -> Type {
        dispatch_array!(self, a => element_type_of(a))
    }

    pub fn size(&self) -> Size {
        dispatch_array!(self, a => a.size())
    }

    pub fn dims(&self) -> usize {
        dispatch_array!(self, a => a.dims())
    }

    pub fn len(&self) -> usize {
        dispatch_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Size {
        dispatch_array!(self, a => a.capacity())
    }

    pub fn storage_id(&self) -> usize {
        dispatch_array!(self, a => a.storage_id())
    }

    pub fn positions(&self) -> StridedIter {
        dispatch_array!(self, a => a.positions())
    }

    /// Checked downcast to the concrete array type.
    pub fn get_as<T: Element>(&self) -> Option<&Array<T>> {
        T::from_base(self)
    }

    pub fn get_as_mut<T: Element>(&mut self) -> Option<&mut Array<T>> {
        T::from_base_mut(self)
    }

    pub fn is<T: Element>(&self) -> bool {
        self.get_as::<T>().is_some()
    }

    /// Like [`get_as`](Self::get_as) but reports the mismatch as an error.
    pub fn expect_as<T: Element>(&self) -> Result<&Array<T>> {
        self.get_as::<T>().ok_or(RpgmlError::TypeMismatch {
            expected: T::TYPE,
            actual: self.elem_type(),
        })
    }

    pub fn get_value(&self, coords: &Coordinates) -> Result<Value> {
        dispatch_array!(self, a => a.get_value(coords))
    }

    pub fn set_value(&self, value: &Value, coords: &Coordinates) -> Result<()> {
        dispatch_array!(self, a => a.set_value(value, coords))
    }

    pub fn set_value_v(&self, value: &Value, coords: &[usize]) -> Result<()> {
        dispatch_array!(self, a => a.set_value_v(value, coords))
    }

    pub fn fill_value(&self, value: &Value) -> Result<()> {
        dispatch_array!(self, a => a.fill_value(value))
    }

    /// Elements in logical order as dynamic values.
    pub fn to_values(&self) -> Vec<Value> {
        dispatch_array!(self, a => {
            let mut out = Vec::with_capacity(a.len());
            a.for_each(|v| out.push(v.to_value()));
            out
        })
    }

    /// The single element of a scalar or one-element array.
    pub fn scalar_value(&self) -> Option<Value> {
        if self.len() != 1 {
            return None;
        }
        self.to_values().into_iter().next()
    }

    pub fn resize(&mut self, size: &Size) -> Result<()> {
        dispatch_array!(self, a => a.resize(size))
    }

    pub fn resize_v(&mut self, size: &[usize]) -> Result<()> {
        dispatch_array!(self, a => a.resize_v(size))
    }

    pub fn reserve(&mut self, size: &Size) -> Result<()> {
        dispatch_array!(self, a => a.reserve(size))
    }

    pub fn roi(&self, pos: &Coordinates, size: &Size) -> Result<ArrayBase> {
        dispatch_array!(self, a => a.roi(pos, size).map(ArrayBase::from))
    }

    pub fn set_mirrored(&mut self, dim: usize) -> Result<()> {
        dispatch_array!(self, a => a.set_mirrored(dim))
    }

    pub fn set_rotated(&mut self, quarter_turns: i32) -> Result<()> {
        dispatch_array!(self, a => a.set_rotated(quarter_turns))
    }

    pub fn set_sparse(&mut self, dim: usize, nth: usize, offset: usize) -> Result<()> {
        dispatch_array!(self, a => a.set_sparse(dim, nth, offset))
    }

    /// Deep copy into fresh contiguous storage.
    pub fn copy(&self) -> ArrayBase {
        dispatch_array!(self, a => ArrayBase::from(a.copy()))
    }
}

fn element_type_of<T: Element>(_: &Array<T>) -> Type {
    T::TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_for_every_element_type() {
        let size = Size::new(&[2, 3]).unwrap();
        for ty in Type::element_types() {
            let a = ArrayBase::new(*ty, size).unwrap();
            assert_eq!(a.elem_type(), *ty);
            assert_eq!(a.size(), size);
            assert_eq!(a.len(), 6);
        }
        assert!(ArrayBase::new(Type::Nil, size).is_err());
    }

    #[test]
    fn test_get_as_checks_type() {
        let base = ArrayBase::from(Array::<f32>::new(Size::new(&[4]).unwrap()));
        assert!(base.get_as::<f32>().is_some());
        assert!(base.get_as::<f64>().is_none());
        assert!(base.is::<f32>());
        assert!(matches!(
            base.expect_as::<u8>(),
            Err(RpgmlError::TypeMismatch {
                expected: Type::U8,
                actual: Type::F32
            })
        ));
    }

    #[test]
    fn test_scalar_round_trip() {
        let base = ArrayBase::scalar(&Value::I32(23)).unwrap();
        assert_eq!(base.dims(), 0);
        assert_eq!(base.elem_type(), Type::I32);
        assert_eq!(base.scalar_value(), Some(Value::I32(23)));
        assert!(ArrayBase::scalar(&Value::Nil).is_err());
    }

    #[test]
    fn test_from_values_casts() {
        let size = Size::new(&[3]).unwrap();
        let base =
            ArrayBase::from_values(Type::U16, size, &[Value::I64(1), Value::F64(2.5), Value::U8(3)])
                .unwrap();
        assert_eq!(base.to_values(), vec![Value::U16(1), Value::U16(2), Value::U16(3)]);
        assert!(ArrayBase::from_values(Type::U16, size, &[Value::I64(1)]).is_err());
    }

    #[test]
    fn test_erased_geometry_keeps_type() {
        let a = Array::from_vec(Size::new(&[2, 2]).unwrap(), vec![1u8, 2, 3, 4]).unwrap();
        let mut base = ArrayBase::from(a);
        base.set_rotated(2).unwrap();
        base.set_mirrored(0).unwrap();
        assert_eq!(base.elem_type(), Type::U8);
        assert_eq!(
            base.to_values(),
            vec![Value::U8(3), Value::U8(4), Value::U8(1), Value::U8(2)]
        );
    }

    #[test]
    fn test_erased_roi_aliases() {
        let base = ArrayBase::new(Type::F64, Size::new(&[3, 3]).unwrap()).unwrap();
        let roi = base
            .roi(&Size::new(&[1, 1]).unwrap(), &Size::new(&[2, 2]).unwrap())
            .unwrap();
        assert_eq!(roi.storage_id(), base.storage_id());
        roi.fill_value(&Value::I32(5)).unwrap();
        assert_eq!(base.get_value(&Size::new(&[2, 2]).unwrap()).unwrap(), Value::F64(5.0));
        assert_eq!(base.get_value(&Size::new(&[0, 0]).unwrap()).unwrap(), Value::F64(0.0));
    }

    #[test]
    fn test_nested_arrays() {
        let inner: ArrayRef = Arc::new(ArrayBase::scalar(&Value::F64(1.5)).unwrap());
        let outer = ArrayBase::new(Type::Array, Size::new(&[2]).unwrap()).unwrap();
        outer
            .set_value_v(&Value::Array(inner.clone()), &[1])
            .unwrap();
        let values = outer.to_values();
        assert_eq!(values[0], Value::Nil);
        assert_eq!(values[1], Value::Array(inner));
        assert!(outer.set_value_v(&Value::I32(1), &[0]).is_err());
    }
}
