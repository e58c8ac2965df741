//! Small pure helpers shared by the engine and adapters.

pub mod accept;
pub mod filesize;

pub use accept::AcceptFilter;
pub use filesize::{bytes_to_mib, format_file_size};
