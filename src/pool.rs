use std::{iter, mem, ptr, ptr::NonNull};

use crate::{
  align_to,
  block::{Block, BlockState},
  capacity::calculate_capacity,
  error::AllocError,
  region::MappedRegion,
};

/// Bookkeeping stored in the first bytes of every pool's own mapping.
#[repr(C, align(16))]
struct PoolHeader {
  region: MappedRegion,
  next_pool: Option<FreeListPool>,
  free_list_head: *mut Block,
}

/// One OS-mapped region carved into variable-size blocks.
///
/// ```text
///   ┌─────────────┬────────┬─────────┬────────┬─────────┬─────────────────┐
///   │ PoolHeader  │ Block  │ payload │ Block  │ payload │  Block (free)   │
///   │ head, next  │ occup. │         │ free ──┼─────────┼─▶ next: null    │
///   └─────────────┴────────┴─────────┴────────┴─────────┴─────────────────┘
///   ▲ page aligned         ▲ returned to caller
/// ```
///
/// Blocks tile the region back to back. Freed blocks are pushed on the
/// front of the free list and never merged with their neighbours.
pub struct FreeListPool {
  header: NonNull<PoolHeader>,
}

impl FreeListPool {
  /// Bytes reserved at the front of the mapping for the pool itself.
  pub const HEADER_SIZE: usize = align_to!(mem::size_of::<PoolHeader>(), Block::ALIGN);

  /// Maps a pool able to hold at least `pool_size` bytes of blocks.
  ///
  /// The whole region after the pool header starts out as a single free
  /// block.
  pub fn new(pool_size: usize) -> Result<Self, AllocError> {
    let capacity = calculate_capacity(pool_size, Self::HEADER_SIZE)
      .ok_or(AllocError::CapacityOverflow { requested: pool_size })?;
    let region = MappedRegion::map(capacity)?;
    let base = region.as_ptr();

    tracing::debug!(pool_size, capacity, address = ?base, "mapped free-list pool");

    unsafe {
      let first = base.add(Self::HEADER_SIZE).cast::<Block>();
      first.write(Block::free(capacity - Self::HEADER_SIZE, ptr::null_mut()));

      let header = base.cast::<PoolHeader>();
      header.write(PoolHeader {
        region,
        next_pool: None,
        free_list_head: first,
      });

      Ok(Self {
        header: NonNull::new_unchecked(header),
      })
    }
  }

  fn header(&self) -> &PoolHeader {
    unsafe { self.header.as_ref() }
  }

  fn header_mut(&mut self) -> &mut PoolHeader {
    unsafe { self.header.as_mut() }
  }

  fn base(&self) -> *mut u8 {
    self.header().region.as_ptr()
  }

  /// Total bytes mapped for this pool, its own header included.
  pub fn capacity(&self) -> usize {
    self.header().region.len()
  }

  /// Reports whether `address` falls anywhere inside this pool's mapping.
  fn contains(
    &self,
    address: usize,
  ) -> bool {
    self.header().region.contains(address)
  }

  unsafe fn successor(block: *const Block) -> *mut Block {
    match unsafe { (*block).state() } {
      BlockState::Free { next } => next,
      BlockState::Occupied => ptr::null_mut(),
    }
  }

  /// Carves `size` bytes out of the first free block large enough to hold
  /// them.
  ///
  /// Returns `None` for an empty request or when no free block fits.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    let payload = size.checked_add(Block::ALIGN - 1)? & !(Block::ALIGN - 1);
    let needed = payload.checked_add(Block::HEADER_SIZE)?;

    unsafe {
      let mut prev: *mut Block = ptr::null_mut();
      let mut block = self.header().free_list_head;

      loop {
        if block.is_null() {
          tracing::trace!(size, capacity = self.capacity(), "free-list pool exhausted");
          return None;
        }

        if (*block).payload_capacity() >= payload {
          break;
        }

        prev = block;
        block = Self::successor(block);
      }

      let mut successor = Self::successor(block);
      let mut carved = (*block).size;

      // Leftovers too small for a header plus payload stay with the block.
      if carved - needed > Block::HEADER_SIZE {
        let remainder = block.cast::<u8>().add(needed).cast::<Block>();
        remainder.write(Block::free(carved - needed, successor));

        successor = remainder;
        carved = needed;
      }

      if prev.is_null() {
        self.header_mut().free_list_head = successor;
      } else {
        (*prev).link(successor);
      }

      (*block).mark_occupied(carved);

      let address = block.cast::<u8>().add(Block::HEADER_SIZE);

      tracing::trace!(size, carved, address = ?address, "free-list allocation");

      NonNull::new(address)
    }
  }

  /// Returns the block owning `ptr` to the front of the free list.
  ///
  /// Null, foreign and already freed pointers are ignored.
  pub fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    if !self.verify_ptr(ptr) {
      return;
    }

    let offset = ptr as usize - Block::HEADER_SIZE - self.base() as usize;

    unsafe {
      let block = self.base().add(offset).cast::<Block>();

      tracing::trace!(address = ?ptr, size = (*block).size, "free-list free");

      (*block).link(self.header().free_list_head);
      self.header_mut().free_list_head = block;
    }
  }

  /// Reports whether `ptr` is the payload address of a block of this pool
  /// that is currently allocated.
  ///
  /// Blocks tile the pool back to back, so the header in front of `ptr`
  /// only counts if walking block sizes from the first block lands on it.
  /// Bytes inside a live payload that happen to look like a header are
  /// never mistaken for one.
  pub fn verify_ptr(
    &self,
    ptr: *const u8,
  ) -> bool {
    if ptr.is_null() || !self.contains(ptr as usize) {
      return false;
    }

    let start = self.base() as usize;
    let Some(header_offset) = (ptr as usize - start).checked_sub(Block::HEADER_SIZE) else {
      return false;
    };

    if header_offset < Self::HEADER_SIZE || header_offset % Block::ALIGN != 0 {
      return false;
    }

    let mut offset = Self::HEADER_SIZE;

    while offset < header_offset {
      let size = unsafe { (*self.base().add(offset).cast::<Block>()).size };

      if size < Block::HEADER_SIZE {
        return false;
      }

      offset += size;
    }

    offset == header_offset && unsafe { (*self.base().add(offset).cast::<Block>()).is_occupied() }
  }

  /// Number of blocks currently on the free list.
  pub fn free_block_count(&self) -> usize {
    let mut count = 0;
    let mut block = self.header().free_list_head;

    while !block.is_null() {
      count += 1;
      block = unsafe { Self::successor(block) };
    }

    count
  }

  /// Free bytes across all free blocks, headers included.
  pub fn free_bytes(&self) -> usize {
    let mut total = 0;
    let mut block = self.header().free_list_head;

    while !block.is_null() {
      unsafe {
        total += (*block).size;
        block = Self::successor(block);
      }
    }

    total
  }

  pub fn next_pool(&self) -> Option<&FreeListPool> {
    self.header().next_pool.as_ref()
  }

  pub fn next_pool_mut(&mut self) -> Option<&mut FreeListPool> {
    self.header_mut().next_pool.as_mut()
  }

  /// Iterates over this pool and every pool linked after it.
  pub fn chain(&self) -> impl Iterator<Item = &FreeListPool> {
    iter::successors(Some(self), |pool| pool.next_pool())
  }

  /// Links `pool` after the last pool of this chain.
  pub fn push_back(
    &mut self,
    pool: FreeListPool,
  ) {
    let mut tail = self.header;

    unsafe {
      while let Some(next) = &(*tail.as_ptr()).next_pool {
        tail = next.header;
      }

      (*tail.as_ptr()).next_pool = Some(pool);
    }
  }

  fn take_next(&mut self) -> Option<FreeListPool> {
    self.header_mut().next_pool.take()
  }
}

impl Drop for FreeListPool {
  fn drop(&mut self) {
    // Unlink the rest of the chain first so long chains do not recurse.
    let mut next = self.take_next();
    while let Some(mut pool) = next {
      next = pool.take_next();
    }

    let header = unsafe { self.header.as_ptr().read() };

    tracing::debug!(capacity = header.region.len(), "releasing free-list pool");

    drop(header);
  }
}
