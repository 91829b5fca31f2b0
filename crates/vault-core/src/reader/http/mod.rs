//! C3: the segmented HTTP reader. Probes a remote object's size via `HEAD`,
//! splits it into pieces, and reads them back in order while a pool of
//! range workers fetches pieces ahead of the cursor in parallel.

mod head;
mod worker;

pub use head::{probe, HeadProbe};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::Reader;
use crate::config::VaultConfig;
use crate::error::{CoreError, CoreResult};
use crate::piece::Piece;
use crate::piece_set::{calc_piece_size, create_pieces, split_pieces};

/// Lifecycle of a `SegmentedHttpReader`. `Draining` is purely informational
/// (derived, not stored): it just means the work queue has run dry while
/// pieces are still being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Fresh,
    Primed,
    Draining,
    Finished,
    Closed,
}

type WorkQueue = Arc<Mutex<VecDeque<Vec<Arc<Piece>>>>>;

pub struct SegmentedHttpReader {
    url: String,
    size: u64,
    filename: Option<String>,
    content_type: Option<String>,

    segments: usize,
    buffer_size: usize,
    group_size: usize,
    min_log2: u32,
    max_log2: u32,
    max_piece_count: usize,

    sought: bool,
    primed: bool,
    finished: bool,
    closed: bool,

    pos: u64,
    pieces: Vec<Arc<Piece>>,
    current_index: usize,
    admitted: usize,

    cancel: Arc<AtomicBool>,
    queue: Option<WorkQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl SegmentedHttpReader {
    /// Issues the construction-time `HEAD` probe and returns a reader in
    /// the `Fresh` state. No worker threads exist yet.
    pub fn new(
        url: impl Into<String>,
        segments: usize,
        buffer_size_factor: usize,
        group_size: usize,
        min_log2: u32,
        max_log2: u32,
        max_piece_count: usize,
    ) -> CoreResult<Self> {
        let url = url.into();
        let probe = head::probe(&url)?;
        Ok(Self {
            url,
            size: probe.content_length,
            filename: probe.filename,
            content_type: probe.content_type,
            segments: segments.max(1),
            buffer_size: buffer_size_factor.max(1) * segments.max(1),
            group_size: group_size.max(1),
            min_log2,
            max_log2,
            max_piece_count,
            sought: false,
            primed: false,
            finished: false,
            closed: false,
            pos: 0,
            pieces: Vec::new(),
            current_index: 0,
            admitted: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            queue: None,
            workers: Vec::new(),
        })
    }

    pub fn with_config(url: impl Into<String>, cfg: &VaultConfig) -> CoreResult<Self> {
        Self::new(
            url,
            cfg.default_segments,
            cfg.buffer_size_factor,
            cfg.group_size,
            cfg.min_piece_size_log2,
            cfg.max_piece_size_log2,
            cfg.max_piece_count,
        )
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn state(&self) -> State {
        if self.closed {
            return State::Closed;
        }
        if self.finished {
            return State::Finished;
        }
        if !self.primed {
            return State::Fresh;
        }
        let drained = self.queue.as_ref().is_some_and(|q| q.lock().unwrap().is_empty());
        if drained {
            State::Draining
        } else {
            State::Primed
        }
    }

    /// Builds the piece list and work queue from the current position and
    /// opens the initial admission window, without spawning any threads.
    /// Split out from `ensure_primed` so piece-geometry behavior can be
    /// tested without real worker threads touching the network.
    fn build_pieces_and_admit(&mut self) {
        let piece_size = calc_piece_size(self.size, self.min_log2, self.max_log2, self.max_piece_count);
        let pieces = create_pieces(self.size, self.pos, piece_size);
        let groups = split_pieces(&pieces, self.segments, self.group_size);

        self.queue = Some(Arc::new(Mutex::new(VecDeque::from(groups))));
        self.pieces = pieces;
        self.current_index = 0;
        self.admitted = 0;
        self.admit_up_to_window();
    }

    /// Builds pieces, opens the initial admission window, and spawns
    /// `segments` worker threads against the shared work queue. Only runs
    /// once; idempotent after that.
    fn ensure_primed(&mut self) -> CoreResult<()> {
        if self.primed {
            return Ok(());
        }

        self.build_pieces_and_admit();
        let queue = self.queue.as_ref().unwrap();

        let mut workers = Vec::with_capacity(self.segments);
        for _ in 0..self.segments {
            let queue = Arc::clone(queue);
            let cancel = Arc::clone(&self.cancel);
            let url = self.url.clone();
            workers.push(std::thread::spawn(move || worker_loop(url, queue, cancel)));
        }

        self.workers = workers;
        self.primed = true;
        Ok(())
    }

    /// Opens gates so that exactly `buffer_size` pieces beyond the cursor
    /// (or all remaining pieces, if fewer) are admitted.
    fn admit_up_to_window(&mut self) {
        let target = (self.current_index + self.buffer_size).min(self.pieces.len());
        while self.admitted < target {
            self.pieces[self.admitted].open_gate();
            self.admitted += 1;
        }
    }
}

fn worker_loop(url: String, queue: WorkQueue, cancel: Arc<AtomicBool>) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let group = queue.lock().unwrap().pop_front();
        let Some(group) = group else {
            return;
        };
        if let Err(e) = worker::fetch_group(&url, &group, &cancel) {
            tracing::warn!(error = %e, "range worker exiting after error");
            return;
        }
    }
}

impl Reader for SegmentedHttpReader {
    fn seek(&mut self, pos: u64) -> CoreResult<()> {
        if self.sought {
            return Err(CoreError::InvalidInput(
                "SegmentedHttpReader seek is permitted exactly once".into(),
            ));
        }
        self.sought = true;
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, num_bytes: usize) -> CoreResult<Vec<u8>> {
        if !self.sought {
            self.seek(0)?;
        }
        if self.finished || self.closed {
            return Ok(Vec::new());
        }
        self.ensure_primed()?;

        loop {
            if self.current_index >= self.pieces.len() {
                self.finished = true;
                return Ok(Vec::new());
            }
            let piece = Arc::clone(&self.pieces[self.current_index]);
            let data = piece.read(num_bytes);
            if !data.is_empty() {
                self.pos += data.len() as u64;
                return Ok(data);
            }
            self.current_index += 1;
            self.admit_up_to_window();
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.store(true, Ordering::Relaxed);
        for p in &self.pieces {
            p.set_complete();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn tell(&self) -> u64 {
        self.pos
    }
}

impl Drop for SegmentedHttpReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_stub(size: u64) -> SegmentedHttpReader {
        SegmentedHttpReader {
            url: "http://example.invalid/x".to_string(),
            size,
            filename: None,
            content_type: None,
            segments: 2,
            buffer_size: 4,
            group_size: 100,
            min_log2: 10,
            max_log2: 20,
            max_piece_count: 1000,
            sought: false,
            primed: false,
            finished: false,
            closed: false,
            pos: 0,
            pieces: Vec::new(),
            current_index: 0,
            admitted: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            queue: None,
            workers: Vec::new(),
        }
    }

    #[test]
    fn second_seek_is_rejected() {
        let mut r = reader_stub(1000);
        r.seek(0).unwrap();
        assert!(r.seek(1).is_err());
    }

    #[test]
    fn state_starts_fresh() {
        let r = reader_stub(1000);
        assert_eq!(r.state(), State::Fresh);
    }

    #[test]
    fn priming_opens_buffer_size_pieces_worth_of_gates() {
        let mut r = reader_stub(1000);
        r.segments = 2;
        r.buffer_size = 3;
        r.min_log2 = 6; // piece size 64 -> ~16 pieces across 1000 bytes
        r.max_log2 = 10;
        r.max_piece_count = 1000;
        r.build_pieces_and_admit();
        assert_eq!(r.admitted, 3);
        for p in r.pieces.iter().take(3) {
            assert!(p.wait_can_download(std::time::Duration::from_millis(10)));
        }
        assert!(!r.pieces[3].wait_can_download(std::time::Duration::from_millis(10)));
    }

    #[test]
    fn advancing_cursor_admits_next_piece() {
        let mut r = reader_stub(1000);
        r.segments = 1;
        r.buffer_size = 2;
        r.min_log2 = 6;
        r.max_log2 = 10;
        r.build_pieces_and_admit();
        assert_eq!(r.admitted, 2);
        r.current_index = 1;
        r.admit_up_to_window();
        assert_eq!(r.admitted, 3);
    }

    #[test]
    fn close_is_idempotent_without_priming() {
        let mut r = reader_stub(10);
        r.close();
        r.close();
        assert_eq!(r.state(), State::Closed);
    }
}
