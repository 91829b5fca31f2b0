//! C7: multi-volume RAR member access. `header` parses just enough of the
//! RAR3/RAR5 block structure to locate a stored file's body and the
//! archive's own volume-naming declaration; `volume` computes a volume's
//! successor name under either naming scheme; `reader` ties both together
//! into direct (streaming) and lazy (random-access) readers.

pub mod header;
pub mod reader;
pub mod volume;

pub use reader::{open_lazy, DirectRarReader};
pub use volume::NamingScheme;
