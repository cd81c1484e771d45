use std::io;

use thiserror::Error;

/// Hard failures reported by the OS-backed allocators.
///
/// Exhausted pools and zero-size requests are not errors: they surface as a
/// `None` allocation. Only failing to obtain backing memory is escalated.
#[derive(Debug, Error)]
pub enum AllocError {
  /// The operating system refused to map a region of `size` bytes.
  #[error("failed to map a {size} byte region")]
  AcquisitionFailure {
    size: usize,
    #[source]
    source: io::Error,
  },

  /// The request cannot be rounded up to whole pages without overflowing.
  #[error("a pool holding {requested} bytes exceeds the address space")]
  CapacityOverflow { requested: usize },
}
