//! C8: stream-plugin evaluators. A `Streamer` scores how good a candidate
//! playback source is; `Router::stream` picks the highest score and asks
//! the winner to materialize it.

pub mod direct;
pub mod rar;

pub use direct::DirectStreamer;
pub use rar::RarStreamer;

use crate::error::CoreResult;
use crate::item::Item;
use crate::reader::Reader;

/// What a streamer hands back once selected: either a plain `Item` to read
/// directly, or an already-constructed reader (e.g. a multi-volume RAR
/// stream assembled from several child items).
pub enum StreamOutput {
    Item(Item),
    Reader(Box<dyn Reader>),
}

/// A candidate playback source. `evaluate` scores it without side effects
/// so `Router::stream` can compare several before committing to one;
/// `stream` is only called on the winner.
pub trait Streamer: Send {
    fn evaluate(&self) -> Option<i64>;
    fn stream(&self) -> CoreResult<StreamOutput>;
}
