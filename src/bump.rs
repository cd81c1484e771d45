use std::{
  cell::{Cell, UnsafeCell},
  mem,
  ptr::NonNull,
};

use crate::align_to;

#[repr(C, align(16))]
struct Buffer<const N: usize>(UnsafeCell<[u8; N]>);

/// A fixed buffer of `N` bytes carved up by a monotonically growing cursor.
///
/// The bytes live inline, so a pool placed in a `static` or on the stack
/// needs no heap. Every allocation start is recorded so that only addresses
/// actually handed out since the last reset verify.
pub struct LinearPool<const N: usize> {
  buffer: Buffer<N>,
  starts: [Cell<bool>; N],
  cursor: Cell<usize>,
}

impl<const N: usize> LinearPool<N> {
  pub const fn new() -> Self {
    Self {
      buffer: Buffer(UnsafeCell::new([0; N])),
      starts: [const { Cell::new(false) }; N],
      cursor: Cell::new(0),
    }
  }

  fn base(&self) -> *mut u8 {
    self.buffer.0.get().cast()
  }

  /// Reserves `size` bytes at the first `align`-aligned address at or after
  /// the cursor. Returns `None` for an empty request or when the bytes do
  /// not fit before the end of the buffer.
  pub fn reserve(
    &self,
    size: usize,
    align: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    let start = self.base() as usize;
    let offset = align_to!(start + self.cursor.get(), align) - start;
    let end = offset.checked_add(size)?;

    if end > N {
      tracing::trace!(size, used = self.cursor.get(), capacity = N, "linear pool exhausted");
      return None;
    }

    self.starts[offset].set(true);
    self.cursor.set(end);

    NonNull::new(unsafe { self.base().add(offset) })
  }

  /// Reports whether `address` is the start of an allocation below the cursor.
  pub fn is_live(
    &self,
    address: usize,
  ) -> bool {
    let start = self.base() as usize;

    if address < start {
      return false;
    }

    let offset = address - start;

    offset < self.cursor.get() && self.starts[offset].get()
  }

  /// Rewinds the cursor to the start of the buffer.
  pub fn reset(&mut self) {
    let used = self.cursor.replace(0);

    for start in &self.starts[..used] {
      start.set(false);
    }
  }

  pub fn used(&self) -> usize {
    self.cursor.get()
  }

  pub const fn capacity(&self) -> usize {
    N
  }

  pub fn remaining(&self) -> usize {
    N - self.cursor.get()
  }
}

impl<const N: usize> Default for LinearPool<N> {
  fn default() -> Self {
    Self::new()
  }
}

/// Typed bump-pointer allocator over a [`LinearPool`] of `N` bytes.
///
/// Allocation is O(1) and never grows the pool. There is no way to release
/// a single allocation; [`BumpAllocator::free`] rewinds the whole pool.
///
/// Pointers point into the allocator itself, so they are only valid while
/// the allocator stays where it was when they were handed out.
pub struct BumpAllocator<const N: usize> {
  pool: LinearPool<N>,
}

impl<const N: usize> BumpAllocator<N> {
  pub const fn new() -> Self {
    Self {
      pool: LinearPool::new(),
    }
  }

  /// Reserves room for `count` values of `T`.
  ///
  /// Returns `None` when `count * size_of::<T>()` is zero or when the pool
  /// cannot hold it. The two cases are indistinguishable to the caller.
  pub fn allocate<T>(
    &self,
    count: usize,
  ) -> Option<NonNull<T>> {
    let size = count.checked_mul(mem::size_of::<T>())?;
    let address = self.pool.reserve(size, mem::align_of::<T>())?;

    tracing::trace!(size, address = ?address, "bump allocation");

    Some(address.cast())
  }

  /// Invalidates every allocation at once and rewinds the pool.
  pub fn free(&mut self) {
    tracing::trace!(released = self.pool.used(), "bump reset");

    self.pool.reset();
  }

  /// Reports whether `ptr` was returned by [`BumpAllocator::allocate`] since
  /// the last [`BumpAllocator::free`].
  pub fn verify_ptr<T>(
    &self,
    ptr: *const T,
  ) -> bool {
    !ptr.is_null() && self.pool.is_live(ptr as usize)
  }

  pub fn used(&self) -> usize {
    self.pool.used()
  }

  pub const fn capacity(&self) -> usize {
    self.pool.capacity()
  }

  pub fn remaining(&self) -> usize {
    self.pool.remaining()
  }
}

impl<const N: usize> Default for BumpAllocator<N> {
  fn default() -> Self {
    Self::new()
  }
}
