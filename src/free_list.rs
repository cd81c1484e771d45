use std::{mem, ptr::NonNull};

use crate::{block::Block, error::AllocError, pool::FreeListPool};

/// Per-pool size target used by [`FreeListAllocator::with_default_pool_size`].
pub const DEFAULT_POOL_SIZE: usize = 4096;

/// A growable chain of [`FreeListPool`]s.
///
/// Requests are served first-fit from the first pool that can hold them.
/// When none can, a new pool is mapped and linked at the tail. Pools are
/// never returned to the OS before the allocator is dropped.
///
/// ```text
///   FreeListAllocator
///   ┌────────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
///   │ first_pool ├───▶│  pool 0  ├───▶│  pool 1  ├───▶│  pool 2  ├───▶ None
///   └────────────┘    └──────────┘    └──────────┘    └──────────┘
/// ```
pub struct FreeListAllocator {
  first_pool: FreeListPool,
  pool_size: usize,
}

impl FreeListAllocator {
  /// Maps the first pool, sized to hold at least `pool_size` bytes.
  ///
  /// Fails when the OS refuses the mapping.
  pub fn new(pool_size: usize) -> Result<Self, AllocError> {
    let first_pool = FreeListPool::new(pool_size)?;

    tracing::debug!(
      pool_size,
      capacity = first_pool.capacity(),
      "free-list allocator ready"
    );

    Ok(Self {
      first_pool,
      pool_size,
    })
  }

  pub fn with_default_pool_size() -> Result<Self, AllocError> {
    Self::new(DEFAULT_POOL_SIZE)
  }

  /// Reserves room for `count` values of `T`, growing the chain if needed.
  ///
  /// `Ok(None)` means the request itself is unusable: zero bytes, a size
  /// that overflows, or an alignment above the block alignment. An `Err`
  /// means a new pool was needed and could not be mapped.
  pub fn allocate<T>(
    &mut self,
    count: usize,
  ) -> Result<Option<NonNull<T>>, AllocError> {
    if mem::align_of::<T>() > Block::ALIGN {
      tracing::trace!(align = mem::align_of::<T>(), "alignment not supported");
      return Ok(None);
    }

    let Some(size) = count.checked_mul(mem::size_of::<T>()) else {
      return Ok(None);
    };

    if size == 0 {
      return Ok(None);
    }

    let mut cursor = Some(&mut self.first_pool);

    while let Some(pool) = cursor {
      if let Some(ptr) = pool.allocate(size) {
        return Ok(Some(ptr.cast()));
      }

      cursor = pool.next_pool_mut();
    }

    // Big enough for the configured size and for this request's block.
    let fit = size
      .checked_add(Block::ALIGN - 1 + Block::HEADER_SIZE)
      .ok_or(AllocError::CapacityOverflow { requested: size })?;

    let mut pool = FreeListPool::new(self.pool_size.max(fit))?;
    let ptr = pool.allocate(size);

    tracing::debug!(
      size,
      capacity = pool.capacity(),
      pools = self.pool_count() + 1,
      "free-list chain grew"
    );

    self.first_pool.push_back(pool);

    Ok(ptr.map(NonNull::cast))
  }

  /// Releases `ptr` back to the pool that handed it out.
  ///
  /// Pointers no pool recognizes as live are ignored.
  pub fn free<T>(
    &mut self,
    ptr: *mut T,
  ) {
    let ptr = ptr.cast::<u8>();
    let mut cursor = Some(&mut self.first_pool);

    while let Some(pool) = cursor {
      if pool.verify_ptr(ptr) {
        pool.free(ptr);
        return;
      }

      cursor = pool.next_pool_mut();
    }
  }

  /// Reports whether some pool of this allocator handed out `ptr` and it
  /// has not been freed since.
  pub fn verify_ptr<T>(
    &self,
    ptr: *const T,
  ) -> bool {
    self.pools().any(|pool| pool.verify_ptr(ptr.cast()))
  }

  pub fn pools(&self) -> impl Iterator<Item = &FreeListPool> {
    self.first_pool.chain()
  }

  pub fn pool_count(&self) -> usize {
    self.pools().count()
  }

  pub fn pool_size(&self) -> usize {
    self.pool_size
  }

  /// Bytes mapped across the whole chain.
  pub fn capacity(&self) -> usize {
    self.pools().map(FreeListPool::capacity).sum()
  }
}

#[cfg(test)]
mod tests {
  use std::ptr;

  use proptest::prelude::*;

  use super::*;
  use crate::{align_to, capacity::page_size};

  fn one_page_allocator() -> FreeListAllocator {
    FreeListAllocator::new(page_size() - FreeListPool::HEADER_SIZE).unwrap()
  }

  #[test]
  fn test_typed_allocation() {
    let mut allocator = one_page_allocator();

    let first = allocator.allocate::<usize>(10).unwrap().unwrap();
    assert!(allocator.verify_ptr(first.as_ptr()));

    let second = allocator.allocate::<usize>(1).unwrap().unwrap();
    assert!(allocator.verify_ptr(second.as_ptr()));

    assert_eq!(
      second.as_ptr() as usize - first.as_ptr() as usize,
      align_to!(10 * mem::size_of::<usize>(), Block::ALIGN) + Block::HEADER_SIZE
    );
  }

  #[test]
  fn test_unusable_requests() {
    #[allow(dead_code)]
    #[repr(align(64))]
    struct CacheLine([u8; 64]);

    let mut allocator = one_page_allocator();

    assert!(allocator.allocate::<u8>(0).unwrap().is_none());
    assert!(allocator.allocate::<()>(16).unwrap().is_none());
    assert!(allocator.allocate::<CacheLine>(1).unwrap().is_none());
    assert!(allocator.allocate::<u64>(usize::MAX).unwrap().is_none());
    assert_eq!(allocator.pool_count(), 1);
  }

  #[test]
  fn test_values_survive_neighbouring_allocations() {
    let mut allocator = one_page_allocator();

    unsafe {
      let words = allocator.allocate::<u64>(4).unwrap().unwrap().as_ptr();
      let bytes = allocator.allocate::<u8>(3).unwrap().unwrap().as_ptr();

      for i in 0..4 {
        words.add(i).write(u64::MAX - i as u64);
      }
      ptr::write_bytes(bytes, 0xAB, 3);

      for i in 0..4 {
        assert_eq!(words.add(i).read(), u64::MAX - i as u64);
      }
      assert_eq!(bytes.add(2).read(), 0xAB);
    }
  }

  #[test]
  fn test_freed_block_is_reused() {
    let mut allocator = one_page_allocator();

    let a = allocator.allocate::<u64>(4).unwrap().unwrap();
    allocator.free(a.as_ptr());

    assert!(!allocator.verify_ptr(a.as_ptr()));

    let b = allocator.allocate::<u64>(2).unwrap().unwrap();

    assert_eq!(b, a);
    assert!(allocator.verify_ptr(b.as_ptr()));
  }

  #[test]
  fn test_verify_rejects_unowned_pointers() {
    let mut allocator = one_page_allocator();
    let mut other = one_page_allocator();

    let mine = allocator.allocate::<u32>(8).unwrap().unwrap();
    let theirs = other.allocate::<u32>(8).unwrap().unwrap();

    assert!(!allocator.verify_ptr(ptr::null::<u32>()));
    assert!(!allocator.verify_ptr(theirs.as_ptr()));
    assert!(!allocator.verify_ptr(unsafe { mine.as_ptr().add(1) }));
    assert!(!allocator.verify_ptr(unsafe { mine.as_ptr().add(4) }));

    let local = 7u32;
    assert!(!allocator.verify_ptr(&local as *const u32));
  }

  #[test]
  fn test_foreign_and_double_free_are_ignored() {
    let mut allocator = one_page_allocator();
    let mut other = one_page_allocator();

    let theirs = other.allocate::<u8>(24).unwrap().unwrap();
    allocator.free(theirs.as_ptr());
    assert!(other.verify_ptr(theirs.as_ptr()));

    let mine = allocator.allocate::<u8>(24).unwrap().unwrap();
    allocator.free(mine.as_ptr());
    let free_blocks = allocator.pools().next().unwrap().free_block_count();

    allocator.free(mine.as_ptr());
    allocator.free(ptr::null_mut::<u8>());

    assert_eq!(
      allocator.pools().next().unwrap().free_block_count(),
      free_blocks
    );
  }

  #[test]
  fn test_oversized_request_grows_by_one_pool() {
    let mut allocator = one_page_allocator();
    let size = 3 * page_size();

    let big = allocator.allocate::<u8>(size).unwrap().unwrap();

    assert_eq!(allocator.pool_count(), 2);
    assert!(allocator.verify_ptr(big.as_ptr()));
    assert!(allocator.pools().nth(1).unwrap().capacity() >= size);

    unsafe { ptr::write_bytes(big.as_ptr(), 0x5A, size) };

    // Still fits in the first pool, so the chain stays as it is.
    let small = allocator.allocate::<u64>(2).unwrap().unwrap();

    assert_eq!(allocator.pool_count(), 2);
    assert!(allocator.pools().next().unwrap().verify_ptr(small.as_ptr().cast::<u8>()));
  }

  #[test]
  fn test_chain_grows_only_when_pools_are_full() {
    let mut allocator = one_page_allocator();
    let mut live = Vec::new();

    while allocator.pool_count() == 1 {
      live.push(allocator.allocate::<u8>(256).unwrap().unwrap());
    }

    let per_pool = (page_size() - FreeListPool::HEADER_SIZE) / (256 + Block::HEADER_SIZE);

    assert_eq!(live.len(), per_pool + 1);
    assert!(live.iter().all(|ptr| allocator.verify_ptr(ptr.as_ptr())));

    for ptr in &live {
      allocator.free(ptr.as_ptr());
    }

    for _ in 0..live.len() {
      allocator.allocate::<u8>(256).unwrap().unwrap();
    }

    assert_eq!(allocator.pool_count(), 2);
  }

  #[test]
  fn test_freed_neighbours_are_not_coalesced() {
    let mut allocator = one_page_allocator();
    let block_space = page_size() - FreeListPool::HEADER_SIZE;
    let half = (block_space / 2 - Block::HEADER_SIZE) & !(Block::ALIGN - 1);

    let a = allocator.allocate::<u8>(half).unwrap().unwrap();
    let b = allocator.allocate::<u8>(half).unwrap().unwrap();

    allocator.free(a.as_ptr());
    allocator.free(b.as_ptr());

    let first = allocator.pools().next().unwrap();
    assert!(first.free_block_count() >= 2);

    // Enough bytes are free in total, but no single block can hold this.
    allocator.allocate::<u8>(2 * half).unwrap().unwrap();

    assert_eq!(allocator.pool_count(), 2);
  }

  #[test]
  fn test_free_reaches_later_pools() {
    let mut allocator = one_page_allocator();

    let big = allocator.allocate::<u8>(2 * page_size()).unwrap().unwrap();
    assert_eq!(allocator.pool_count(), 2);

    allocator.free(big.as_ptr());

    assert!(!allocator.verify_ptr(big.as_ptr()));
    assert!(allocator.pools().nth(1).unwrap().free_block_count() >= 1);
    assert_eq!(allocator.pool_count(), 2);
  }

  #[test]
  fn test_interior_pointer_cannot_be_freed_into_live_block() {
    let mut allocator = one_page_allocator();

    let outer = allocator.allocate::<usize>(8).unwrap().unwrap();

    unsafe {
      outer.as_ptr().write(usize::MAX);
      outer.as_ptr().add(1).write(Block::HEADER_SIZE + Block::ALIGN);

      let inner = outer.as_ptr().add(Block::HEADER_SIZE / mem::size_of::<usize>());

      assert!(!allocator.verify_ptr(inner));

      allocator.free(inner);

      let next = allocator.allocate::<usize>(1).unwrap().unwrap();

      assert_ne!(next.as_ptr(), inner);
      assert!(allocator.verify_ptr(outer.as_ptr()));
    }
  }

  #[test]
  #[cfg(target_pointer_width = "64")]
  fn test_growth_failures_are_reported() {
    let mut allocator = one_page_allocator();

    match allocator.allocate::<u8>(usize::MAX - 100) {
      Err(AllocError::CapacityOverflow { .. }) => {}
      other => panic!("expected capacity overflow, got {other:?}"),
    }

    match allocator.allocate::<u8>(1 << 60) {
      Err(AllocError::AcquisitionFailure { size, .. }) => assert!(size > 1 << 60),
      other => panic!("expected acquisition failure, got {other:?}"),
    }

    assert_eq!(allocator.pool_count(), 1);

    let ptr = allocator.allocate::<u64>(4).unwrap().unwrap();
    assert!(allocator.verify_ptr(ptr.as_ptr()));
    assert_eq!(allocator.pool_count(), 1);
  }

  #[test]
  #[cfg(target_pointer_width = "64")]
  fn test_construction_failure_is_reported() {
    match FreeListAllocator::new(usize::MAX - 10) {
      Err(AllocError::CapacityOverflow { requested }) => assert_eq!(requested, usize::MAX - 10),
      Err(other) => panic!("expected capacity overflow, got {other}"),
      Ok(_) => panic!("an address-space sized pool was mapped"),
    }

    assert!(matches!(
      FreeListAllocator::new(1 << 60),
      Err(AllocError::AcquisitionFailure { .. })
    ));
  }

  #[test]
  fn test_default_pool_size() {
    let allocator = FreeListAllocator::with_default_pool_size().unwrap();

    assert_eq!(allocator.pool_size(), DEFAULT_POOL_SIZE);
    assert!(allocator.capacity() >= DEFAULT_POOL_SIZE + FreeListPool::HEADER_SIZE);
    assert_eq!(allocator.capacity() % page_size(), 0);
  }

  proptest! {
    #[test]
    fn prop_live_allocations_verify_and_never_overlap(
      sizes in prop::collection::vec(1usize..2048, 1..48),
    ) {
      let mut allocator = one_page_allocator();
      let mut ranges = Vec::new();

      for size in &sizes {
        let ptr = allocator.allocate::<u8>(*size).unwrap().unwrap();

        prop_assert!(allocator.verify_ptr(ptr.as_ptr()));
        prop_assert_eq!(ptr.as_ptr() as usize % Block::ALIGN, 0);

        ranges.push((ptr.as_ptr() as usize, *size));
      }

      let mut sorted = ranges.clone();
      sorted.sort_unstable();
      for pair in sorted.windows(2) {
        prop_assert!(pair[0].0 + pair[0].1 <= pair[1].0);
      }

      for (address, _) in &ranges {
        allocator.free(*address as *mut u8);
      }

      for (address, _) in &ranges {
        prop_assert!(!allocator.verify_ptr(*address as *const u8));
      }
    }

    #[test]
    fn prop_zero_size_is_always_rejected(fill in 0usize..4096) {
      let mut allocator = one_page_allocator();

      if fill > 0 {
        allocator.allocate::<u8>(fill).unwrap();
      }

      prop_assert!(allocator.allocate::<u32>(0).unwrap().is_none());
    }
  }
}
