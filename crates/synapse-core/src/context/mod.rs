//! Context Window Manager (C7) and Context Assembler (C8).

mod assembler;
mod window;

pub use assembler::{BufferEntry, ContextAssembler, ContextOptions};
pub use window::{create_windows, estimate_tokens, merge, window_size, Window};
