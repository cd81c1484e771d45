//! # poolalloc - Pool-Based Memory Allocators
//!
//! This crate provides two allocators that hand out raw, untyped storage from
//! bounded backing regions instead of the general-purpose heap:
//!
//! - a **bump allocator** over a fixed inline buffer, and
//! - a **free-list allocator** over a growable chain of `mmap`ed pools.
//!
//! ## Bump Allocator
//!
//! ```text
//!   BumpAllocator<N>:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                        INLINE BUFFER (N bytes)                       │
//!   │                                                                      │
//!   │   ┌─────┬─────┬─────┬─────┬───────────────────────────────────────┐  │
//!   │   │ A1  │ A2  │ A3  │ A4  │            Free Space                 │  │
//!   │   └─────┴─────┴─────┴─────┴───────────────────────────────────────┘  │
//!   │                           ▲                                     ▲    │
//!   │                           │                                     │    │
//!   │                        Cursor                                 End    │
//!   │                     (next alloc)                        (fixed)      │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Each allocation moves the cursor forward: O(1).
//!   `free()` rewinds the cursor to zero, invalidating everything at once.
//! ```
//!
//! ## Free-List Allocator
//!
//! Every pool is a page-aligned mapping whose first bytes hold the pool's own
//! bookkeeping. The rest is tiled by blocks, each starting with a header:
//!
//! ```text
//!   Single Allocation:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ next: OCCUPIED  │  │  ┌──────────────────────────┐  │
//!   │  │ size: 16 + N'   │  │  │  N bytes, rounded up to  │  │
//!   │  └─────────────────┘  │  │  N' (a multiple of 16)   │  │
//!   │      16 bytes         │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! Allocation is first-fit with splitting. Freed blocks go to the front of
//! the list and are never merged. When no pool can serve a request, a new
//! pool is mapped and appended to the chain.
//!
//! ## Crate Structure
//!
//! ```text
//!   poolalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── capacity   - Page size and pool capacity calculation
//!   ├── region     - mmap/munmap backed regions
//!   ├── error      - AllocError
//!   ├── block      - Free-list block header (internal)
//!   ├── bump       - LinearPool and BumpAllocator
//!   ├── pool       - FreeListPool
//!   └── free_list  - FreeListAllocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use poolalloc::{BumpAllocator, FreeListAllocator};
//!
//! let mut bump = BumpAllocator::<256>::new();
//! let values = bump.allocate::<u32>(4).unwrap();
//! unsafe { values.as_ptr().write(42) };
//! assert!(bump.verify_ptr(values.as_ptr()));
//! bump.free();
//!
//! let mut pools = FreeListAllocator::new(4096).unwrap();
//! let words = pools.allocate::<u64>(10).unwrap().unwrap();
//! unsafe { words.as_ptr().write(7) };
//! pools.free(words.as_ptr());
//! assert!(!pools.verify_ptr(words.as_ptr()));
//! ```
//!
//! ## Failure Reporting
//!
//! - Out of room or zero bytes requested: `None`. The two are not told apart.
//! - Freeing or verifying a pointer the allocator does not own: ignored / `false`.
//! - The OS refusing a mapping: [`AllocError`], from construction or growth.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No coalescing**: Adjacent freed blocks stay separate
//! - **Unbounded growth**: The pool chain grows as long as the OS maps memory
//! - **Alignment**: Free-list payloads are 16-byte aligned at most
//! - **Unix-only**: Requires `libc` for `mmap`, `munmap` and `sysconf`
//!
//! ## Safety
//!
//! Allocation itself is safe, but the returned pointers are raw: reading or
//! writing through them requires `unsafe`, and nothing stops a caller from
//! using a pointer after it was freed or after the bump allocator was moved.

pub mod align;
mod block;
mod bump;
mod capacity;
mod error;
mod free_list;
mod pool;
mod region;

pub use bump::{BumpAllocator, LinearPool};
pub use capacity::{calculate_capacity, page_size};
pub use error::AllocError;
pub use free_list::{DEFAULT_POOL_SIZE, FreeListAllocator};
pub use pool::FreeListPool;
pub use region::MappedRegion;
