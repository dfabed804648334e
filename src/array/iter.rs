//! Strided N-d iteration.
//!
//! [`StridedIter`] walks the logical element order of a view (dimension 0
//! fastest) and yields flat indices into the backing store, computed as
//! `origin + Σ pos[d] * stride[d]`.

use crate::array::size::{Coordinates, Size, MAX_DIMS};
use std::iter::FusedIterator;

#[derive(Debug, Clone)]
pub struct StridedIter {
    size: Size,
    stride: [isize; MAX_DIMS],
    origin: isize,
    pos: [usize; MAX_DIMS],
    flat: isize,
    front: usize,
    back: usize,
}

impl StridedIter {
    pub fn new(size: Size, stride: [isize; MAX_DIMS], origin: usize) -> Self {
        Self {
            size,
            stride,
            origin: origin as isize,
            pos: [0; MAX_DIMS],
            flat: origin as isize,
            front: 0,
            back: size.elements(),
        }
    }

    /// Coordinates of the next element yielded from the front.
    pub fn position(&self) -> Coordinates {
        let mut c = self.size;
        for d in 0..self.size.dims() {
            c.set(d, self.pos[d]);
        }
        c
    }

    /// Number of elements left between front and back.
    #[inline]
    pub fn distance(&self) -> usize {
        self.back - self.front
    }

    /// Flat index of the element at logical (row-major, dim 0 fastest) index.
    pub fn flat_at(&self, mut linear: usize) -> usize {
        let mut flat = self.origin;
        for d in 0..self.size.dims() {
            let extent = self.size[d];
            flat += (linear % extent) as isize * self.stride[d];
            linear /= extent;
        }
        flat as usize
    }

    fn seek(&mut self, linear: usize) {
        let mut rest = linear;
        self.flat = self.origin;
        for d in 0..self.size.dims() {
            let extent = self.size[d];
            self.pos[d] = rest % extent;
            rest /= extent;
            self.flat += self.pos[d] as isize * self.stride[d];
        }
        self.front = linear;
    }

    fn step(&mut self) {
        for d in 0..self.size.dims() {
            self.pos[d] += 1;
            self.flat += self.stride[d];
            if self.pos[d] < self.size[d] {
                return;
            }
            self.flat -= self.stride[d] * self.size[d] as isize;
            self.pos[d] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.front >= self.back {
            return None;
        }
        let flat = self.flat as usize;
        self.front += 1;
        self.step();
        Some(flat)
    }

    fn nth(&mut self, n: usize) -> Option<usize> {
        let target = self.front.saturating_add(n);
        if target >= self.back {
            self.front = self.back;
            return None;
        }
        self.seek(target);
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.distance();
        (n, Some(n))
    }
}

impl DoubleEndedIterator for StridedIter {
    fn next_back(&mut self) -> Option<usize> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.flat_at(self.back))
    }
}

impl ExactSizeIterator for StridedIter {}

impl FusedIterator for StridedIter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn natural(size: &Size) -> [isize; MAX_DIMS] {
        let mut stride = [0; MAX_DIMS];
        let mut acc = 1isize;
        for d in 0..size.dims() {
            stride[d] = acc;
            acc *= size[d] as isize;
        }
        stride
    }

    #[test]
    fn test_contiguous_order() {
        let size = Size::new(&[3, 2]).unwrap();
        let it = StridedIter::new(size, natural(&size), 0);
        assert_eq!(it.collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_negative_stride() {
        let size = Size::new(&[4]).unwrap();
        let it = StridedIter::new(size, [-1, 0, 0, 0], 3);
        assert_eq!(it.collect::<Vec<_>>(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_nth_and_back() {
        let size = Size::new(&[3, 3]).unwrap();
        let mut it = StridedIter::new(size, natural(&size), 0);
        assert_eq!(it.nth(4), Some(4));
        assert_eq!(it.position().as_slice(), &[2, 1]);
        assert_eq!(it.next_back(), Some(8));
        assert_eq!(it.len(), 3);
        assert_eq!(it.collect::<Vec<_>>(), vec![5, 6, 7]);
    }

    #[test]
    fn test_scalar_and_empty() {
        let it = StridedIter::new(Size::scalar(), [0; MAX_DIMS], 7);
        assert_eq!(it.collect::<Vec<_>>(), vec![7]);

        let empty = Size::new(&[0, 5]).unwrap();
        assert_eq!(StridedIter::new(empty, natural(&empty), 0).count(), 0);
    }
}
