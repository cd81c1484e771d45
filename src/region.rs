use std::{io, ptr, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};

use crate::error::AllocError;

/// A private, anonymous, read/write mapping obtained from the OS.
///
/// The mapping is released with `munmap` when the value is dropped. Moving a
/// `MappedRegion` never moves the mapped bytes.
#[derive(Debug)]
pub struct MappedRegion {
  start: NonNull<u8>,
  len: usize,
}

impl MappedRegion {
  /// Maps `len` zeroed bytes. `len` should be a page multiple.
  pub fn map(len: usize) -> Result<Self, AllocError> {
    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(AllocError::AcquisitionFailure {
        size: len,
        source: io::Error::last_os_error(),
      });
    }

    match NonNull::new(address as *mut u8) {
      Some(start) => Ok(Self { start, len }),
      None => Err(AllocError::AcquisitionFailure {
        size: len,
        source: io::Error::other("mmap returned a null mapping"),
      }),
    }
  }

  pub fn as_ptr(&self) -> *mut u8 {
    self.start.as_ptr()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Reports whether `address` lies in `[start, start + len)`.
  pub fn contains(
    &self,
    address: usize,
  ) -> bool {
    let start = self.start.as_ptr() as usize;

    address >= start && address - start < self.len
  }
}

impl Drop for MappedRegion {
  fn drop(&mut self) {
    let result = unsafe { munmap(self.start.as_ptr() as *mut c_void, self.len) };

    if result != 0 {
      tracing::warn!(
        address = ?self.start,
        len = self.len,
        error = %io::Error::last_os_error(),
        "munmap failed while releasing a region"
      );
    }
  }
}
