//! C5: concatenates a list of `(item, seek, length)` descriptors into one
//! sequential byte stream, used by the RAR reader to stitch a stored
//! member's body across volumes while skipping each volume's header/footer.

use std::sync::Arc;

use super::Reader;
use crate::error::{CoreError, CoreResult};
use crate::item::Item;

/// Opens an `Item` for reading. Implemented by `Router` in normal use; kept
/// as a narrow trait here so this module doesn't need the full router.
pub trait ItemOpener: Send + Sync {
    fn open(&self, item: &Item) -> CoreResult<Box<dyn Reader>>;
}

/// One segment of the virtual stream: `length` bytes of `item` starting at
/// `seek` within it.
#[derive(Clone)]
pub struct Segment {
    pub item: Arc<Item>,
    pub seek: u64,
    pub length: u64,
}

struct CurrentSegment {
    index: usize,
    reader: Box<dyn Reader>,
    remaining: u64,
}

pub struct VirtualFileReader {
    opener: Arc<dyn ItemOpener>,
    segments: Vec<Segment>,
    total_size: u64,
    pos: u64,
    sought: bool,
    current: Option<CurrentSegment>,
}

impl VirtualFileReader {
    pub fn new(opener: Arc<dyn ItemOpener>, segments: Vec<Segment>) -> Self {
        let total_size = segments.iter().map(|s| s.length).sum();
        Self {
            opener,
            segments,
            total_size,
            pos: 0,
            sought: false,
            current: None,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Finds the segment containing virtual offset `virtual_pos` by
    /// subtracting segment lengths until the remainder lands inside one,
    /// and opens/seeks it. Leaves `current` as `None` if `virtual_pos` is
    /// at or past the end of the virtual stream.
    fn locate(&mut self, virtual_pos: u64) -> CoreResult<()> {
        let mut remaining = virtual_pos;
        for (index, seg) in self.segments.iter().enumerate() {
            if remaining < seg.length {
                let mut reader = self.opener.open(&seg.item)?;
                reader.seek(seg.seek + remaining)?;
                self.current = Some(CurrentSegment {
                    index,
                    reader,
                    remaining: seg.length - remaining,
                });
                return Ok(());
            }
            remaining -= seg.length;
        }
        self.current = None;
        Ok(())
    }

    fn advance_to_next_segment(&mut self) -> CoreResult<bool> {
        let next_index = self.current.as_ref().map_or(0, |c| c.index + 1);
        let Some(seg) = self.segments.get(next_index) else {
            self.current = None;
            return Ok(false);
        };
        let mut reader = self.opener.open(&seg.item)?;
        reader.seek(seg.seek)?;
        self.current = Some(CurrentSegment {
            index: next_index,
            reader,
            remaining: seg.length,
        });
        Ok(true)
    }
}

impl Reader for VirtualFileReader {
    fn seek(&mut self, pos: u64) -> CoreResult<()> {
        if self.sought {
            return Err(CoreError::InvalidInput(
                "VirtualFileReader seek is permitted exactly once".into(),
            ));
        }
        self.sought = true;
        self.pos = pos;
        self.locate(pos)
    }

    fn read(&mut self, num_bytes: usize) -> CoreResult<Vec<u8>> {
        if !self.sought {
            self.seek(0)?;
        }
        loop {
            if self.current.is_none() {
                return Ok(Vec::new());
            }
            let remaining = self.current.as_ref().unwrap().remaining;
            if remaining == 0 {
                if !self.advance_to_next_segment()? {
                    return Ok(Vec::new());
                }
                continue;
            }

            let want = (num_bytes as u64).min(remaining) as usize;
            let cur = self.current.as_mut().unwrap();
            let data = cur.reader.read(want)?;
            if data.is_empty() {
                // Underlying segment ended short of its declared length;
                // treat it as exhausted and move to the next one.
                cur.remaining = 0;
                continue;
            }
            cur.remaining -= data.len() as u64;
            self.pos += data.len() as u64;
            return Ok(data);
        }
    }

    fn close(&mut self) {
        if let Some(cur) = self.current.as_mut() {
            cur.reader.close();
        }
        self.current = None;
    }

    fn tell(&self) -> u64 {
        self.pos
    }
}
