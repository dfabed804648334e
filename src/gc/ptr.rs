//! Reference counted pointers used for every shared runtime object.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Shared owning pointer with atomic reference counting.
///
/// Acyclic garbage is released as soon as the last `CountPtr` drops. Objects
/// that can take part in cycles are additionally registered with a
/// [`GarbageCollector`](super::GarbageCollector).
pub struct CountPtr<T: ?Sized>(pub(super) Arc<T>);

impl<T> CountPtr<T> {
    /// Untracked object, exempt from cycle collection.
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Construct an object that holds a weak pointer to itself.
    pub fn new_cyclic(f: impl FnOnce(&WeakPtr<T>) -> T) -> Self {
        Self(Arc::new_cyclic(|weak| f(&WeakPtr(weak.clone()))))
    }
}

impl<T: ?Sized> CountPtr<T> {
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }

    pub fn downgrade(this: &Self) -> WeakPtr<T> {
        WeakPtr(Arc::downgrade(&this.0))
    }

    /// Address identifying the pointee, as seen by the collector.
    pub fn addr(this: &Self) -> usize {
        Arc::as_ptr(&this.0) as *const () as usize
    }
}

impl<T: ?Sized> Clone for CountPtr<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for CountPtr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for CountPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Non-owning counterpart of [`CountPtr`].
pub struct WeakPtr<T: ?Sized>(Weak<T>);

impl<T> WeakPtr<T> {
    pub fn new() -> Self {
        Self(Weak::new())
    }
}

impl<T> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> WeakPtr<T> {
    pub fn upgrade(&self) -> Option<CountPtr<T>> {
        self.0.upgrade().map(CountPtr)
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Weak)")
    }
}
