//! Intrusive atomically-counted ownership handles.
//!
//! Two variants share one counting discipline (the count lives next to the
//! value, its transition to zero destroys the value exactly once):
//!
//! - [`SharedHandle`] is the multi-thread slot. Cloning and replacing the
//!   same slot may race, and neither the pointer read nor the count bump
//!   is atomic with respect to a concurrent replace, so the clone path
//!   holds a spinlock around "read the pointer, take a reference" as one
//!   step and the replace path holds it around the pointer exchange.
//!   Value access is scoped ([`SharedHandle::with`]) and pinned by a
//!   temporary reference, so a racing replace can retarget the slot but
//!   can never free the value mid-read.
//! - [`UniqueHandle`] keeps the atomic count but drops the spinlock.
//!   Retargeting requires `&mut self`, so the unsynchronized path is
//!   serialized by the borrow checker rather than by caller convention.
//!   Clones handed to other threads keep the value alive; they cannot
//!   retarget this handle.

use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{fence, AtomicPtr, AtomicUsize, Ordering};

use super::spinlock::SpinLock;

struct CountedBox<T> {
    refs: AtomicUsize,
    value: T,
}

impl<T> CountedBox<T> {
    /// Heap-allocate `value` with an initial count of one.
    fn alloc(value: T) -> *mut CountedBox<T> {
        Box::into_raw(Box::new(CountedBox {
            refs: AtomicUsize::new(1),
            value,
        }))
    }
}

/// Take one more reference. `ptr` must point at a live box.
unsafe fn retain<T>(ptr: *mut CountedBox<T>) {
    (*ptr).refs.fetch_add(1, Ordering::Relaxed);
}

/// Give up one reference, destroying the box on the transition to zero.
///
/// The release decrement plus the acquire fence on the zero path order all
/// prior accesses before the destruction, whichever thread performs the
/// final decrement.
unsafe fn release<T>(ptr: *mut CountedBox<T>) {
    if (*ptr).refs.fetch_sub(1, Ordering::Release) == 1 {
        fence(Ordering::Acquire);
        drop(Box::from_raw(ptr));
    }
}

/// Multi-thread-safe reference-counted slot.
pub struct SharedHandle<T> {
    slot: AtomicPtr<CountedBox<T>>,
    // Guards the pointer-read-plus-retain and exchange steps; nothing else.
    guard: SpinLock,
}

unsafe impl<T: Send + Sync> Send for SharedHandle<T> {}
unsafe impl<T: Send + Sync> Sync for SharedHandle<T> {}

impl<T> SharedHandle<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: AtomicPtr::new(CountedBox::alloc(value)),
            guard: SpinLock::new(),
        }
    }

    /// A slot holding nothing.
    pub fn empty() -> Self {
        Self {
            slot: AtomicPtr::new(ptr::null_mut()),
            guard: SpinLock::new(),
        }
    }

    pub fn is_set(&self) -> bool {
        !self.slot.load(Ordering::Acquire).is_null()
    }

    /// Run `f` against the current value, or return `None` if the slot is
    /// empty.
    ///
    /// The value is pinned by a temporary reference for the duration of
    /// `f`: a concurrent [`replace`](Self::replace) swaps the slot but
    /// cannot destroy the value until `f` returns.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let pinned = self.grab();
        if pinned.is_null() {
            return None;
        }
        // The grab incremented the count, so the box outlives any swap
        // performed while f runs.
        let result = unsafe { f(&(*pinned).value) };
        unsafe { release(pinned) };
        Some(result)
    }

    /// Swap the slot's contents, dropping the displaced value if this was
    /// its last reference.
    ///
    /// The decrement happens outside the spinlock; only the exchange is
    /// inside it.
    pub fn replace(&self, value: Option<T>) {
        let fresh = match value {
            Some(v) => CountedBox::alloc(v),
            None => ptr::null_mut(),
        };
        let displaced = {
            let _held = self.guard.lock();
            self.slot.swap(fresh, Ordering::AcqRel)
        };
        if !displaced.is_null() {
            unsafe { release(displaced) };
        }
    }

    /// References to the current value across all handles, not counting
    /// the probe itself. Zero for an empty slot. Diagnostics only; the
    /// answer can be stale by the time the caller sees it.
    pub fn ref_count(&self) -> usize {
        let pinned = self.grab();
        if pinned.is_null() {
            return 0;
        }
        let count = unsafe { (*pinned).refs.load(Ordering::Relaxed) } - 1;
        unsafe { release(pinned) };
        count
    }

    /// Read the pointer and take a reference as one step.
    fn grab(&self) -> *mut CountedBox<T> {
        let _held = self.guard.lock();
        let current = self.slot.load(Ordering::Acquire);
        if !current.is_null() {
            unsafe { retain(current) };
        }
        current
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: AtomicPtr::new(self.grab()),
            guard: SpinLock::new(),
        }
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        // &mut self: no other thread can touch this particular handle.
        let current = *self.slot.get_mut();
        if !current.is_null() {
            unsafe { release(current) };
        }
    }
}

/// Single-owner counted handle.
///
/// Clone and drop touch only the atomic count and are safe from any
/// thread; everything that changes what the handle points at takes
/// `&mut self`.
pub struct UniqueHandle<T> {
    ptr: *mut CountedBox<T>,
}

unsafe impl<T: Send + Sync> Send for UniqueHandle<T> {}
unsafe impl<T: Send + Sync> Sync for UniqueHandle<T> {}

impl<T> UniqueHandle<T> {
    pub fn new(value: T) -> Self {
        Self {
            ptr: CountedBox::alloc(value),
        }
    }

    /// Retarget this handle at `other`'s value, dropping the displaced
    /// value if this was its last reference.
    pub fn replace(&mut self, other: UniqueHandle<T>) {
        let displaced = std::mem::replace(&mut self.ptr, other.ptr);
        std::mem::forget(other);
        unsafe { release(displaced) };
    }

    /// Live references to the value, including this one.
    pub fn ref_count(&self) -> usize {
        unsafe { (*self.ptr).refs.load(Ordering::Relaxed) }
    }
}

impl<T> Deref for UniqueHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &(*self.ptr).value }
    }
}

impl<T> Clone for UniqueHandle<T> {
    fn clone(&self) -> Self {
        unsafe { retain(self.ptr) };
        Self { ptr: self.ptr }
    }
}

impl<T> Drop for UniqueHandle<T> {
    fn drop(&mut self) {
        unsafe { release(self.ptr) };
    }
}
