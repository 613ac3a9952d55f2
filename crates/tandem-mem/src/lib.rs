//! Linear memory shared between native code and the host.
//!
//! Native code addresses memory with 32-bit byte offsets. Everything the host
//! reads from or writes into that address space (draw sequences, strings,
//! out-parameters) goes through the [`Memory`] trait so that the same decoder
//! can run against a plain byte vector or against memory shared with another
//! thread.

mod arena;
mod heap;
mod memory;
mod shared;

pub use arena::{align_up, Arena};
pub use heap::Heap;
pub use memory::{check_align, Memory, MemoryError, VecMemory};
pub use shared::SharedMemory;
