//! Readers: the single random-access interface every resource kind (local
//! file, HTTP object, virtual RAR member, concatenated segments) implements.

pub mod file;
pub mod http;
pub mod virtual_file;

pub use file::FileReader;
pub use http::SegmentedHttpReader;
pub use virtual_file::{ItemOpener, Segment, VirtualFileReader};

use crate::error::CoreResult;

/// Sequential random-access read contract shared by every reader kind.
///
/// `seek` is permitted exactly once, before any `read`; a `read` issued
/// without a prior `seek` implicitly seeks to 0. `close` is idempotent.
pub trait Reader: Send {
    fn seek(&mut self, pos: u64) -> CoreResult<()>;
    fn read(&mut self, num_bytes: usize) -> CoreResult<Vec<u8>>;
    fn close(&mut self);
    fn tell(&self) -> u64;
}
