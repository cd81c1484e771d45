use std::{mem, ptr};

/// Header embedded at the start of every free-list block.
///
/// `next` doubles as the occupancy tag: a free block links to the next free
/// block (or null at the end of the list), an allocated block holds
/// [`Block::OCCUPIED`]. `size` counts the header itself.
#[repr(C, align(16))]
pub struct Block {
  next: *mut Block,
  pub size: usize,
}

/// Decoded view of a block's link field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
  Free { next: *mut Block },
  Occupied,
}

impl Block {
  /// Bytes taken by the header, also the alignment of every payload.
  pub const HEADER_SIZE: usize = mem::size_of::<Block>();
  pub const ALIGN: usize = mem::align_of::<Block>();

  /// Link value marking a block as handed out. Never a mappable address.
  const OCCUPIED: *mut Block = ptr::without_provenance_mut(usize::MAX);

  pub fn free(
    size: usize,
    next: *mut Block,
  ) -> Self {
    Self { next, size }
  }

  pub fn state(&self) -> BlockState {
    if self.next == Self::OCCUPIED {
      BlockState::Occupied
    } else {
      BlockState::Free { next: self.next }
    }
  }

  pub fn is_occupied(&self) -> bool {
    self.state() == BlockState::Occupied
  }

  pub fn mark_occupied(
    &mut self,
    size: usize,
  ) {
    self.next = Self::OCCUPIED;
    self.size = size;
  }

  pub fn link(
    &mut self,
    next: *mut Block,
  ) {
    self.next = next;
  }

  /// Bytes available after the header.
  pub fn payload_capacity(&self) -> usize {
    self.size.saturating_sub(Self::HEADER_SIZE)
  }
}
