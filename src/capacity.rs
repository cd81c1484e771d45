//! Page-granular capacity calculation for OS-backed pools.

use std::sync::OnceLock;

use crate::align_to;

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the host page size in bytes.
///
/// Queried once through `sysconf(_SC_PAGESIZE)` and cached afterwards.
pub fn page_size() -> usize {
  static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

  *PAGE_SIZE.get_or_init(|| {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

    if size > 0 && (size as usize).is_power_of_two() {
      size as usize
    } else {
      FALLBACK_PAGE_SIZE
    }
  })
}

/// Computes how many bytes to map for a pool that must hold `requested`
/// bytes after its own `header` bytes.
///
/// The result is the smallest page multiple that is at least
/// `requested + header`. A page-multiple request therefore always lands on
/// the next page boundary, since the header needs room of its own.
///
/// Returns `None` when the rounded size does not fit in a `usize`.
pub fn calculate_capacity(
  requested: usize,
  header: usize,
) -> Option<usize> {
  let page = page_size();
  let total = requested.checked_add(header)?;
  total.checked_add(page - 1)?;

  Some(align_to!(total, page))
}
