use std::{io::Read, process};

use poolalloc::{FreeListAllocator, page_size};
use tracing_subscriber::EnvFilter;

/// Waits until the user presses ENTER.
/// Handy for watching new mappings appear with `pmap <pid>`.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_chain(allocator: &FreeListAllocator) {
  println!(
    "PID = {}, pools = {}, mapped = {} bytes",
    process::id(),
    allocator.pool_count(),
    allocator.capacity(),
  );

  for (index, pool) in allocator.pools().enumerate() {
    println!(
      "  pool {index}: capacity = {}, free blocks = {}, free bytes = {}",
      pool.capacity(),
      pool.free_block_count(),
      pool.free_bytes(),
    );
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut allocator = match FreeListAllocator::new(page_size() / 2) {
    Ok(allocator) => allocator,
    Err(error) => {
      eprintln!("cannot create allocator: {error}");
      process::exit(1);
    }
  };

  print_chain(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Ten words, then one more. The second block sits right after the
  //    first one's payload and header.
  // --------------------------------------------------------------------
  let first = allocator.allocate::<usize>(10).unwrap().unwrap();
  let second = allocator.allocate::<usize>(1).unwrap().unwrap();
  println!(
    "\n[1] first = {:?}, second = {:?}, distance = {}",
    first,
    second,
    second.as_ptr() as usize - first.as_ptr() as usize
  );
  print_chain(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the first block and ask for something smaller. First-fit
  //    hands the same address back.
  // --------------------------------------------------------------------
  allocator.free(first.as_ptr());
  let reused = allocator.allocate::<u32>(4).unwrap().unwrap();
  println!(
    "\n[2] reused = {:?} (same as first? {})",
    reused,
    reused.cast::<usize>() == first
  );
  print_chain(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A request larger than a whole pool adds one bigger pool.
  // --------------------------------------------------------------------
  match allocator.allocate::<u8>(4 * page_size()) {
    Ok(Some(big)) => println!("\n[3] big = {:?}, verify = {}", big, allocator.verify_ptr(big.as_ptr())),
    Ok(None) => println!("\n[3] request rejected"),
    Err(error) => println!("\n[3] growth failed: {error}"),
  }
  print_chain(&allocator);

  println!("\n[4] End of example. Dropping the allocator unmaps every pool.");
}
