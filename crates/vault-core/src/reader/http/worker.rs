//! Range worker: one curl transfer per work group, feeding a multi-range
//! response back into its pieces in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::piece::Piece;

/// How long a worker blocks on a piece's admission gate before re-checking
/// the cancel flag. Matches the reader's own cancellation poll interval.
const GATE_POLL: Duration = Duration::from_secs(2);

enum Phase {
    AwaitingGate,
    SkippingPartHeader,
    InBody { remaining: u64 },
    Done,
}

/// Drives one group's worth of pieces through a single HTTP response body.
/// Shared with the curl callbacks via a `Mutex` since `Easy::transfer`
/// requires `Fn`, not `FnMut`, closures.
struct GroupCursor<'a> {
    pieces: &'a [Arc<Piece>],
    index: usize,
    phase: Phase,
    is_multipart: bool,
    pending: Vec<u8>,
    cancel: Arc<AtomicBool>,
}

impl<'a> GroupCursor<'a> {
    fn new(pieces: &'a [Arc<Piece>], cancel: Arc<AtomicBool>) -> Self {
        Self {
            pieces,
            index: 0,
            phase: Phase::AwaitingGate,
            is_multipart: false,
            pending: Vec::new(),
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Blocks until the current piece's admission gate opens, polling the
    /// cancel flag every `GATE_POLL`. Returns `false` if cancelled first.
    fn await_gate(&self) -> bool {
        let piece = &self.pieces[self.index];
        loop {
            if self.cancelled() {
                return false;
            }
            if piece.wait_can_download(GATE_POLL) {
                return true;
            }
        }
    }

    /// Feeds one chunk from curl's write callback. Returns `false` if the
    /// transfer should be aborted (cancellation), in which case the caller
    /// must return `Ok(0)` to curl.
    fn feed(&mut self, data: &[u8]) -> bool {
        self.pending.extend_from_slice(data);
        loop {
            match self.phase {
                Phase::Done => {
                    self.pending.clear();
                    return true;
                }
                Phase::AwaitingGate => {
                    if !self.await_gate() {
                        return false;
                    }
                    self.phase = if self.is_multipart {
                        Phase::SkippingPartHeader
                    } else {
                        Phase::InBody {
                            remaining: self.pieces[self.index].size(),
                        }
                    };
                }
                Phase::SkippingPartHeader => {
                    let Some(sep) = find_subslice(&self.pending, b"\r\n\r\n") else {
                        // Header not fully arrived yet; wait for more data.
                        return true;
                    };
                    self.pending.drain(..sep + 4);
                    self.phase = Phase::InBody {
                        remaining: self.pieces[self.index].size(),
                    };
                }
                Phase::InBody { remaining } => {
                    if remaining == 0 {
                        self.pieces[self.index].set_complete();
                        self.index += 1;
                        self.phase = if self.index >= self.pieces.len() {
                            Phase::Done
                        } else {
                            Phase::AwaitingGate
                        };
                        continue;
                    }
                    if self.pending.is_empty() {
                        return true;
                    }
                    let take = (remaining as usize).min(self.pending.len());
                    let body: Vec<u8> = self.pending.drain(..take).collect();
                    self.pieces[self.index].write(&body);
                    self.phase = Phase::InBody {
                        remaining: remaining - take as u64,
                    };
                }
            }
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Builds the `Range: bytes=a1-b1,a2-b2,…` value for a group. Every piece's
/// upper bound is `end_byte - 1`: HTTP ranges are inclusive, and pieces are
/// already laid out as contiguous half-open `[start_byte, end_byte)`
/// intervals, so there is no special case for the group's last piece.
fn range_header_value(group: &[Arc<Piece>]) -> String {
    group
        .iter()
        .map(|p| format!("{}-{}", p.start_byte, p.end_byte.saturating_sub(1)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Fetches one work group: a single multi-range GET, dispatched into the
/// group's pieces in order as the response streams in. Any error here is
/// logged by the caller and ends the worker's loop; it is never retried at
/// this layer.
pub fn fetch_group(url: &str, group: &[Arc<Piece>], cancel: &Arc<AtomicBool>) -> CoreResult<()> {
    if group.is_empty() {
        return Ok(());
    }

    let cursor = Mutex::new(GroupCursor::new(group, Arc::clone(cancel)));

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.range(&range_header_value(group))?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = std::str::from_utf8(data) {
                if let Some((name, value)) = line.trim().split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-type")
                        && value.trim().to_ascii_lowercase().starts_with("multipart/byteranges")
                    {
                        cursor.lock().unwrap().is_multipart = true;
                    }
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            if cursor.lock().unwrap().feed(data) {
                Ok(data.len())
            } else {
                Ok(0)
            }
        })?;

        if let Err(e) = transfer.perform() {
            if e.is_write_error() && cursor.lock().unwrap().cancelled() {
                return Ok(());
            }
            return Err(CoreError::Transient(format!(
                "range GET against {url} failed: {e}"
            )));
        }
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(CoreError::Transient(format!(
            "range GET against {url} returned HTTP {code}"
        )));
    }

    let finished_all = matches!(cursor.into_inner().unwrap().phase, Phase::Done);
    if !finished_all && !cancel.load(Ordering::Relaxed) {
        return Err(CoreError::Transient(
            "response body ended before all pieces in group were filled".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn make_pieces(ranges: &[(u64, u64)]) -> Vec<Arc<Piece>> {
        ranges
            .iter()
            .enumerate()
            .map(|(i, (s, e))| Arc::new(Piece::new(i, *s, *e, i == ranges.len() - 1)))
            .collect()
    }

    #[test]
    fn range_header_joins_inclusive_half_open_bounds() {
        let pieces = make_pieces(&[(0, 100), (100, 250)]);
        assert_eq!(range_header_value(&pieces), "0-99,100-249");
    }

    #[test]
    fn cursor_writes_concatenated_body_across_pieces() {
        let pieces = make_pieces(&[(0, 3), (3, 6)]);
        for p in &pieces {
            p.open_gate();
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let mut cursor = GroupCursor::new(&pieces, cancel);
        assert!(cursor.feed(b"abc"));
        assert!(cursor.feed(b"def"));
        assert!(matches!(cursor.phase, Phase::Done));
        assert_eq!(pieces[0].read(16), b"abc");
        assert!(pieces[0].is_complete());
        assert_eq!(pieces[1].read(16), b"def");
        assert!(pieces[1].is_complete());
    }

    #[test]
    fn cursor_skips_multipart_part_header() {
        let pieces = make_pieces(&[(0, 3)]);
        pieces[0].open_gate();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut cursor = GroupCursor::new(&pieces, cancel);
        cursor.is_multipart = true;
        assert!(cursor.feed(b"--boundary\r\nContent-Range: bytes 0-2/10\r\n\r\nabc"));
        assert_eq!(pieces[0].read(16), b"abc");
    }

    #[test]
    fn cursor_stops_feeding_once_cancelled() {
        let pieces = make_pieces(&[(0, 3)]);
        let cancel = Arc::new(AtomicBool::new(true));
        let mut cursor = GroupCursor::new(&pieces, cancel);
        assert!(!cursor.feed(b"abc"));
    }
}
