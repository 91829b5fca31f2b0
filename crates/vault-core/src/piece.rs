//! `Piece`: a fixed byte range of a resource, downloaded independently and
//! consumed sequentially.
//!
//! A `SegmentedHttpReader` splits its resource into a list of `Piece`s,
//! hands groups of them to worker threads, and reads them back in order.
//! Each piece carries two signals: `can_download` (an admission gate the
//! reader opens for a sliding window of pieces ahead of the read cursor, so
//! workers don't race arbitrarily far ahead and exhaust memory) and
//! `is_complete` (set once a worker has written all of the piece's bytes,
//! used to distinguish "no data yet" from "end of piece" on read).

use std::sync::{Condvar, Mutex};

/// A single piece of a segmented read, identified by its index and byte range.
pub struct Piece {
    pub index: usize,
    pub start_byte: u64,
    pub end_byte: u64,
    pub last_piece: bool,
    can_download: Mutex<bool>,
    can_download_cv: Condvar,
    state: Mutex<PieceState>,
    complete_cv: Condvar,
}

struct PieceState {
    data: Vec<u8>,
    read_pos: usize,
    complete: bool,
}

/// Bounded wait on `is_complete` between read attempts, matching the
/// original's `piece.can_download.wait(2)` / retry-read pattern but capped
/// tighter so a reader's `read()` call returns promptly when the worker
/// stalls or dies without marking the piece complete.
const READ_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

impl Piece {
    pub fn new(index: usize, start_byte: u64, end_byte: u64, last_piece: bool) -> Self {
        Self {
            index,
            start_byte,
            end_byte,
            last_piece,
            can_download: Mutex::new(false),
            can_download_cv: Condvar::new(),
            state: Mutex::new(PieceState {
                data: Vec::new(),
                read_pos: 0,
                complete: false,
            }),
            complete_cv: Condvar::new(),
        }
    }

    pub fn size(&self) -> u64 {
        self.end_byte - self.start_byte
    }

    /// Opens the admission gate: a worker blocked in `wait_can_download` wakes.
    pub fn open_gate(&self) {
        let mut g = self.can_download.lock().unwrap();
        *g = true;
        self.can_download_cv.notify_all();
    }

    /// Blocks until the admission gate is open or `deadline` elapses since the
    /// call, returning whether the gate was open. Mirrors the original's
    /// `can_download.wait(2)` loop; callers re-check a cancellation flag
    /// between calls.
    pub fn wait_can_download(&self, timeout: std::time::Duration) -> bool {
        let g = self.can_download.lock().unwrap();
        if *g {
            return true;
        }
        let (g, _) = self.can_download_cv.wait_timeout(g, timeout).unwrap();
        *g
    }

    /// Appends freshly downloaded bytes. Does not disturb the read cursor:
    /// concurrent readers pick up appended data from wherever they left off.
    pub fn write(&self, data: &[u8]) {
        let mut s = self.state.lock().unwrap();
        s.data.extend_from_slice(data);
        drop(s);
        self.complete_cv.notify_all();
    }

    /// Marks the piece's data as final. Any readers blocked waiting for more
    /// bytes wake and see end-of-piece once the buffered data is drained.
    pub fn set_complete(&self) {
        let mut s = self.state.lock().unwrap();
        s.complete = true;
        self.complete_cv.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().unwrap().complete
    }

    /// Reads up to `num_bytes` from the piece's buffered data, blocking in
    /// `READ_POLL_INTERVAL` increments while the piece is incomplete and has
    /// no buffered data left. Returns an empty `Vec` once the piece is
    /// complete and fully drained.
    pub fn read(&self, num_bytes: usize) -> Vec<u8> {
        loop {
            let mut s = self.state.lock().unwrap();
            let available = s.data.len() - s.read_pos;
            if available > 0 {
                let take = available.min(num_bytes);
                let start = s.read_pos;
                let out = s.data[start..start + take].to_vec();
                s.read_pos += take;
                return out;
            }
            if s.complete {
                return Vec::new();
            }
            let (_guard, _timeout) = self.complete_cv.wait_timeout(s, READ_POLL_INTERVAL).unwrap();
        }
    }
}

impl std::fmt::Debug for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Piece")
            .field("index", &self.index)
            .field("start_byte", &self.start_byte)
            .field("end_byte", &self.end_byte)
            .field("last_piece", &self.last_piece)
            .finish()
    }
}
