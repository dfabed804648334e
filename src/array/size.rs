//! Array sizes and coordinates.
//!
//! Both are the same small inline value: a dimension count (0 for scalars,
//! at most [`MAX_DIMS`]) plus one extent or position per dimension.

use crate::error::{Result, RpgmlError};
use crate::types::Value;
use std::fmt;
use std::ops::Index;

/// Maximum number of array dimensions.
pub const MAX_DIMS: usize = 4;

/// Per-dimension extents of an array.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    dims: usize,
    values: [usize; MAX_DIMS],
}

/// Per-dimension position inside an array.
pub type Coordinates = Size;

impl Size {
    /// Create from a slice of extents. Fails beyond [`MAX_DIMS`].
    pub fn new(values: &[usize]) -> Result<Self> {
        if values.len() > MAX_DIMS {
            return Err(RpgmlError::InvalidArgument(format!(
                "{} dimensions requested, at most {} supported",
                values.len(),
                MAX_DIMS
            )));
        }
        let mut out = Self {
            dims: values.len(),
            values: [0; MAX_DIMS],
        };
        out.values[..values.len()].copy_from_slice(values);
        Ok(out)
    }

    /// Zero-dimensional size of a scalar.
    pub const fn scalar() -> Self {
        Self {
            dims: 0,
            values: [0; MAX_DIMS],
        }
    }

    /// Build from dynamically typed values; negative entries are rejected.
    pub fn from_values(values: &[Value]) -> Result<Self> {
        let mut extents = Vec::with_capacity(values.len());
        for v in values {
            let i = v.to_i64().ok_or_else(|| {
                RpgmlError::InvalidArgument(format!("'{}' is not an integer extent", v))
            })?;
            let u = usize::try_from(i).map_err(|_| {
                RpgmlError::InvalidArgument(format!("negative extent {}", i))
            })?;
            extents.push(u);
        }
        Self::new(&extents)
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    pub fn get(&self, d: usize) -> Option<usize> {
        self.as_slice().get(d).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.values[..self.dims]
    }

    pub(crate) fn set(&mut self, d: usize, value: usize) {
        debug_assert!(d < self.dims);
        self.values[d] = value;
    }

    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.values.swap(a, b);
    }

    /// Number of elements spanned; 1 for scalars.
    pub fn elements(&self) -> usize {
        self.as_slice().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.elements() == 0
    }

    /// True if `coords` has the same dimension count and lies inside.
    pub fn contains(&self, coords: &Coordinates) -> bool {
        coords.dims == self.dims
            && coords
                .as_slice()
                .iter()
                .zip(self.as_slice())
                .all(|(c, s)| c < s)
    }

    /// Element-wise `<=` with equal dimension counts.
    pub fn fits_within(&self, other: &Size) -> bool {
        self.dims == other.dims
            && self
                .as_slice()
                .iter()
                .zip(other.as_slice())
                .all(|(a, b)| a <= b)
    }

    /// Element-wise minimum; dimension counts must match.
    pub fn min(&self, other: &Size) -> Size {
        let mut out = *self;
        for d in 0..self.dims.min(other.dims) {
            out.values[d] = self.values[d].min(other.values[d]);
        }
        out
    }
}

impl Index<usize> for Size {
    type Output = usize;

    fn index(&self, d: usize) -> &usize {
        &self.as_slice()[d]
    }
}

impl fmt::Debug for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size{}", self)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_basics() {
        let s = Size::new(&[3, 4]).unwrap();
        assert_eq!(s.dims(), 2);
        assert_eq!(s[1], 4);
        assert_eq!(s.elements(), 12);
        assert_eq!(s.to_string(), "[3x4]");
        assert_eq!(Size::scalar().elements(), 1);
        assert_eq!(Size::scalar().to_string(), "[]");
    }

    #[test]
    fn test_size_too_many_dims() {
        assert!(Size::new(&[1, 1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_contains() {
        let s = Size::new(&[3, 4]).unwrap();
        assert!(s.contains(&Size::new(&[2, 3]).unwrap()));
        assert!(!s.contains(&Size::new(&[3, 0]).unwrap()));
        assert!(!s.contains(&Size::new(&[1]).unwrap()));
    }

    #[test]
    fn test_from_values_rejects_negative() {
        assert!(Size::from_values(&[Value::I32(2), Value::I32(-1)]).is_err());
        let s = Size::from_values(&[Value::U8(2), Value::F64(5.0)]).unwrap();
        assert_eq!(s.as_slice(), &[2, 5]);
    }
}
