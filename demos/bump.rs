use std::{io::Read, mem, ptr};

use poolalloc::BumpAllocator;
use tracing_subscriber::EnvFilter;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect the process with tools like `gdb`.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_alloc<T>(
  allocator: &BumpAllocator<POOL_SIZE>,
  count: usize,
  addr: *mut T,
) {
  println!(
    "Allocated {} bytes, address = {:?}, used = {}/{}",
    count * mem::size_of::<T>(),
    addr,
    allocator.used(),
    allocator.capacity(),
  );
}

const POOL_SIZE: usize = 256;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  // The whole pool lives inside the allocator value, here on the stack.
  let mut allocator = BumpAllocator::<POOL_SIZE>::new();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Allocate space for a u32.
    // --------------------------------------------------------------------
    let first = allocator.allocate::<u32>(1).unwrap().as_ptr();
    println!("\n[1] Allocate u32");
    print_alloc(&allocator, 1, first);

    first.write(0xDEADBEEF);
    println!("[1] Value written to first = 0x{:X}", first.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes. The cursor ends up on an odd boundary.
    // --------------------------------------------------------------------
    let second = allocator.allocate::<u8>(12).unwrap().as_ptr();
    println!("\n[2] Allocate [u8; 12]");
    print_alloc(&allocator, 12, second);

    ptr::write_bytes(second, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Allocate a u64. The cursor is rounded up to its alignment first.
    // --------------------------------------------------------------------
    let third = allocator.allocate::<u64>(1).unwrap().as_ptr();
    println!("\n[3] Allocate u64 (observe alignment)");
    print_alloc(&allocator, 1, third);

    third.write(0x1122334455667788);
    println!(
      "[3] Address = {:#X}, addr % align = {}",
      third as usize,
      third as usize % mem::align_of::<u64>()
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Ask for more than is left. The pool never grows.
    // --------------------------------------------------------------------
    let too_big = allocator.allocate::<u8>(POOL_SIZE);
    println!("\n[4] Allocate [u8; {POOL_SIZE}] -> {:?}", too_big);
    println!("[4] verify(first) = {}", allocator.verify_ptr(first));
    println!("[4] verify(first + 1 byte) = {}", allocator.verify_ptr(first.cast::<u8>().add(1)));

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Reset. Every pointer handed out so far is now stale.
    // --------------------------------------------------------------------
    allocator.free();
    println!("\n[5] Reset, used = {}", allocator.used());
    println!("[5] verify(first) = {}", allocator.verify_ptr(first));

    let again = allocator.allocate::<u32>(1).unwrap().as_ptr();
    println!(
      "[5] Allocate u32 again: {:?} (same as first? {})",
      again,
      again == first
    );
  }
}
