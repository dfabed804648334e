//! Typed array views over shared, reference counted element storage.
//!
//! An [`Array`] is a view: size, signed per-dimension stride (in elements)
//! and a base offset into an [`ArrayData`] store. Cloning a view, or taking an
//! ROI of it, aliases the same store. Geometry transforms (mirror, rotate,
//! sparse) only rewrite the view and never touch or convert elements.
//!
//! Each view also tracks a per-dimension `extent`: the box, starting at the
//! view's origin and following its strides, that is known to lie inside the
//! store. `resize` inside that box narrows or widens the view in place;
//! anything larger reallocates.

use crate::array::element::Element;
use crate::array::iter::StridedIter;
use crate::array::size::{Coordinates, Size, MAX_DIMS};
use crate::error::{Result, RpgmlError};
use crate::types::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Backing element store shared by every view aliasing it.
pub struct ArrayData<T> {
    elements: RwLock<Vec<T>>,
}

impl<T> ArrayData<T> {
    fn new(elements: Vec<T>) -> Self {
        Self {
            elements: RwLock::new(elements),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.elements.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.elements.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Typed N-d view.
#[derive(Clone)]
pub struct Array<T: Element> {
    data: Arc<ArrayData<T>>,
    size: Size,
    stride: [isize; MAX_DIMS],
    extent: Size,
    offset: usize,
}

fn natural_strides(size: &Size) -> [isize; MAX_DIMS] {
    let mut stride = [0isize; MAX_DIMS];
    let mut acc = 1isize;
    for d in 0..size.dims() {
        stride[d] = acc;
        acc *= size[d].max(1) as isize;
    }
    stride
}

fn check_dim(dim: usize, dims: usize) -> Result<()> {
    if dim >= dims {
        return Err(RpgmlError::InvalidArgument(format!(
            "dimension {} out of range for {}-d array",
            dim, dims
        )));
    }
    Ok(())
}

impl<T: Element> Array<T> {
    /// Contiguous array of `size`, default-initialized.
    pub fn new(size: Size) -> Self {
        Self::from_parts(vec![T::default(); size.elements()], size)
    }

    /// Contiguous array over `elements` (dimension 0 fastest).
    pub fn from_vec(size: Size, elements: Vec<T>) -> Result<Self> {
        if elements.len() != size.elements() {
            return Err(RpgmlError::InvalidArgument(format!(
                "{} elements supplied for size {}",
                elements.len(),
                size
            )));
        }
        Ok(Self::from_parts(elements, size))
    }

    /// Zero-dimensional array holding one element.
    pub fn scalar(value: T) -> Self {
        Self::from_parts(vec![value], Size::scalar())
    }

    fn from_parts(elements: Vec<T>, size: Size) -> Self {
        Self {
            data: Arc::new(ArrayData::new(elements)),
            stride: natural_strides(&size),
            extent: size,
            size,
            offset: 0,
        }
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.size.dims()
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Number of logical elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.size.elements()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stride of dimension `d` in elements.
    pub fn stride(&self, d: usize) -> isize {
        if d < self.dims() {
            self.stride[d]
        } else {
            0
        }
    }

    /// Flat index of the view origin in the store.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Largest size reachable by `resize` without reallocating.
    pub fn capacity(&self) -> Size {
        self.extent
    }

    /// Identity of the backing store.
    pub fn storage_id(&self) -> usize {
        Arc::as_ptr(&self.data) as *const () as usize
    }

    pub fn shares_storage_with(&self, other: &Array<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Strided iterator over flat store indices in logical order.
    pub fn positions(&self) -> StridedIter {
        StridedIter::new(self.size, self.stride, self.offset)
    }

    fn flat_index(&self, coords: &Coordinates) -> Result<usize> {
        if coords.dims() != self.dims() {
            return Err(RpgmlError::Dimension {
                expected: self.dims(),
                actual: coords.dims(),
            });
        }
        if !self.size.contains(coords) {
            return Err(RpgmlError::OutOfBounds(format!(
                "coordinates {} outside array of size {}",
                coords, self.size
            )));
        }
        let mut flat = self.offset as isize;
        for d in 0..self.dims() {
            flat += coords[d] as isize * self.stride[d];
        }
        Ok(flat as usize)
    }

    pub fn get(&self, coords: &Coordinates) -> Result<T> {
        let idx = self.flat_index(coords)?;
        Ok(self.data.read()[idx].clone())
    }

    pub fn set(&self, coords: &Coordinates, value: T) -> Result<()> {
        let idx = self.flat_index(coords)?;
        self.data.write()[idx] = value;
        Ok(())
    }

    pub fn get_value(&self, coords: &Coordinates) -> Result<Value> {
        self.get(coords).map(|v| v.to_value())
    }

    /// Assign one element from a dynamic value.
    pub fn set_value(&self, value: &Value, coords: &Coordinates) -> Result<()> {
        let v = T::from_value(value)?;
        self.set(coords, v)
    }

    pub fn set_value_v(&self, value: &Value, coords: &[usize]) -> Result<()> {
        self.set_value(value, &Size::new(coords)?)
    }

    /// Assign `value` to every element of the view.
    pub fn fill(&self, value: T) {
        let mut store = self.data.write();
        for idx in self.positions() {
            store[idx] = value.clone();
        }
    }

    /// Broadcast a dynamic value after casting it to the element type.
    pub fn fill_value(&self, value: &Value) -> Result<()> {
        let v = T::from_value(value)?;
        self.fill(v);
        Ok(())
    }

    /// Elements in logical order.
    pub fn to_vec(&self) -> Vec<T> {
        let store = self.data.read();
        self.positions().map(|idx| store[idx].clone()).collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        let store = self.data.read();
        for idx in self.positions() {
            f(&store[idx]);
        }
    }

    pub fn for_each_mut(&self, mut f: impl FnMut(&mut T)) {
        let mut store = self.data.write();
        for idx in self.positions() {
            f(&mut store[idx]);
        }
    }

    /// Overwrite the view's elements, in logical order, from `values`.
    fn scatter(&self, values: Vec<T>) {
        let mut store = self.data.write();
        for (idx, v) in self.positions().zip(values) {
            store[idx] = v;
        }
    }

    /// Sort the view's elements in place (logical order).
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) {
        let mut values = self.to_vec();
        values.sort_by(compare);
        self.scatter(values);
    }

    /// Copy elements from an array of the same size.
    pub fn copy_from(&self, src: &Array<T>) -> Result<()> {
        if src.size != self.size {
            return Err(RpgmlError::InvalidArgument(format!(
                "cannot copy {} elements into {}",
                src.size, self.size
            )));
        }
        let values = src.to_vec();
        self.scatter(values);
        Ok(())
    }

    /// Deep copy into fresh contiguous storage.
    pub fn copy(&self) -> Array<T> {
        Self::from_parts(self.to_vec(), self.size)
    }

    // ── Resizing ──

    /// Set a new logical size, reusing storage when it fits the view's extent.
    pub fn resize(&mut self, size: &Size) -> Result<()> {
        if size.fits_within(&self.extent) {
            self.size = *size;
            return Ok(());
        }

        let fresh = Array::<T>::new(*size);
        if size.dims() == self.dims() {
            let overlap = self.size.min(size);
            fresh.copy_box_from(self, &overlap);
        }
        *self = fresh;
        Ok(())
    }

    pub fn resize_v(&mut self, size: &[usize]) -> Result<()> {
        self.resize(&Size::new(size)?)
    }

    /// Ensure `resize` up to `size` will not reallocate; never shrinks.
    pub fn reserve(&mut self, size: &Size) -> Result<()> {
        if size.dims() != self.dims() {
            return Err(RpgmlError::Dimension {
                expected: self.dims(),
                actual: size.dims(),
            });
        }
        if size.fits_within(&self.extent) {
            return Ok(());
        }

        let mut capacity = self.extent;
        for d in 0..self.dims() {
            capacity.set(d, self.extent[d].max(size[d]));
        }
        let mut fresh = Array::<T>::new(capacity);
        fresh.size = self.size;
        fresh.copy_box_from(self, &self.size);
        *self = fresh;
        Ok(())
    }

    /// Copy the box `[0, extent)` from `src` into the same coordinates here.
    fn copy_box_from(&self, src: &Array<T>, extent: &Size) {
        if extent.is_empty() {
            return;
        }
        let values: Vec<T> = {
            let store = src.data.read();
            StridedIter::new(*extent, src.stride, src.offset)
                .map(|idx| store[idx].clone())
                .collect()
        };
        let mut store = self.data.write();
        for (idx, v) in StridedIter::new(*extent, self.stride, self.offset).zip(values) {
            store[idx] = v;
        }
    }

    // ── Views ──

    /// View of the sub-box at `pos` with `size`, aliasing this storage.
    pub fn roi(&self, pos: &Coordinates, size: &Size) -> Result<Array<T>> {
        for (what, s) in [("position", pos), ("size", size)] {
            if s.dims() != self.dims() {
                let err = RpgmlError::Dimension {
                    expected: self.dims(),
                    actual: s.dims(),
                };
                return Err(err.with_context(format!("ROI {}", what)));
            }
        }

        let mut view = self.clone();
        let mut offset = self.offset as isize;
        for d in 0..self.dims() {
            if pos[d] + size[d] > self.size[d] {
                return Err(RpgmlError::OutOfBounds(format!(
                    "ROI at {} of size {} exceeds array of size {}",
                    pos, size, self.size
                )));
            }
            offset += pos[d] as isize * self.stride[d];
            view.extent.set(d, self.extent[d] - pos[d]);
        }
        view.offset = offset as usize;
        view.size = *size;
        Ok(view)
    }

    /// Reverse the element order along `dim`.
    pub fn set_mirrored(&mut self, dim: usize) -> Result<()> {
        check_dim(dim, self.dims())?;
        let n = self.size[dim];
        if n > 0 {
            self.offset = (self.offset as isize + (n as isize - 1) * self.stride[dim]) as usize;
        }
        self.stride[dim] = -self.stride[dim];
        self.extent.set(dim, n);
        Ok(())
    }

    /// Rotate by `quarter_turns` (-3..=3) in the first two dimensions.
    pub fn set_rotated(&mut self, quarter_turns: i32) -> Result<()> {
        if !(-3..=3).contains(&quarter_turns) {
            return Err(RpgmlError::InvalidArgument(format!(
                "rotation must be within -3..=3 quarter turns, got {}",
                quarter_turns
            )));
        }
        let turns = quarter_turns.rem_euclid(4);
        if turns == 0 {
            return Ok(());
        }
        if self.dims() < 2 {
            let err = RpgmlError::Dimension {
                expected: 2,
                actual: self.dims(),
            };
            return Err(err.with_context("rotate needs at least 2 dimensions"));
        }
        for _ in 0..turns {
            self.rotate_once();
        }
        Ok(())
    }

    /// new(i, j) = old(size0 - 1 - j, i)
    fn rotate_once(&mut self) {
        let w = self.size[0];
        if w > 0 {
            self.offset = (self.offset as isize + (w as isize - 1) * self.stride[0]) as usize;
        }
        let (s0, s1) = (self.stride[0], self.stride[1]);
        self.stride[0] = s1;
        self.stride[1] = -s0;
        self.size.swap(0, 1);
        self.extent.set(0, self.extent[1]);
        self.extent.set(1, w);
    }

    /// Keep every `nth` element along `dim`, starting at `offset`.
    pub fn set_sparse(&mut self, dim: usize, nth: usize, offset: usize) -> Result<()> {
        check_dim(dim, self.dims())?;
        if nth < 1 {
            return Err(RpgmlError::InvalidArgument(
                "sparse step must be >= 1".to_string(),
            ));
        }
        if offset >= nth {
            return Err(RpgmlError::InvalidArgument(format!(
                "sparse offset {} must be smaller than step {}",
                offset, nth
            )));
        }

        let shrink = |n: usize| if n > offset { (n - offset).div_ceil(nth) } else { 0 };
        // The origin may only move onto `offset` when the extent covers it
        let extent = shrink(self.extent[dim]);
        if extent > 0 {
            self.offset = (self.offset as isize + offset as isize * self.stride[dim]) as usize;
        }
        self.size.set(dim, shrink(self.size[dim]));
        self.extent.set(dim, extent);
        self.stride[dim] *= nth as isize;
        Ok(())
    }
}

impl<T: Element> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("type", &T::TYPE)
            .field("size", &self.size)
            .field("stride", &&self.stride[..self.dims()])
            .field("offset", &self.offset)
            .finish()
    }
}
