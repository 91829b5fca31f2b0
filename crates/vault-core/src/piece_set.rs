//! Piece geometry: choosing a piece size, enumerating a resource's pieces,
//! and striping them into work groups for a worker pool.

use std::sync::Arc;

use crate::piece::Piece;

/// Picks a power-of-two piece size such that the resulting piece count stays
/// under `max_piece_count`, within `[min_log2, max_log2]`.
///
/// If no exponent in range satisfies the bound, the largest one tried
/// (`max_log2`) is used, matching a plain linear scan that simply stops
/// at the end of the range rather than failing.
pub fn calc_piece_size(size: u64, min_log2: u32, max_log2: u32, max_piece_count: usize) -> u64 {
    debug_assert!(min_log2 < max_log2, "piece size range must be non-empty");
    let mut chosen = min_log2;
    for i in min_log2..=max_log2 {
        chosen = i;
        if size / (1u64 << i) < max_piece_count as u64 {
            break;
        }
    }
    1u64 << chosen
}

/// Enumerates the pieces covering `[start_position, size)` at `piece_size`
/// each, except the last which is truncated to fit. Returns an empty vec if
/// `start_position >= size`.
pub fn create_pieces(size: u64, start_position: u64, piece_size: u64) -> Vec<Arc<Piece>> {
    let remaining = size.saturating_sub(start_position);
    if remaining == 0 || piece_size == 0 {
        return Vec::new();
    }

    let piece_count = (remaining + piece_size - 1) / piece_size;
    let mut pieces = Vec::with_capacity(piece_count as usize);
    for i in 0..piece_count {
        let start_byte = start_position + i * piece_size;
        let end_byte = (start_byte + piece_size).min(size);
        let last_piece = i == piece_count - 1;
        pieces.push(Arc::new(Piece::new(i as usize, start_byte, end_byte, last_piece)));
    }

    tracing::debug!(
        piece_size,
        piece_count,
        "enumerated pieces for segmented read"
    );
    pieces
}

/// Splits a flat piece list into work groups, striping round-robin across
/// `segments` workers and capping each worker's group at `group_size`
/// pieces, so pieces near the read cursor are spread across every worker
/// instead of being claimed by whichever worker happens to drain its queue
/// first.
///
/// Worker `w`'s first group holds pieces at indices `w, w+segments,
/// w+2*segments, ...` up to `group_size` of them; its second group picks up
/// where the first left off, and so on until the piece list is exhausted.
pub fn split_pieces(
    pieces: &[Arc<Piece>],
    segments: usize,
    group_size: usize,
) -> Vec<Vec<Arc<Piece>>> {
    if segments == 0 || group_size == 0 {
        return Vec::new();
    }

    let mut groups = Vec::new();
    let mut offset = 0usize;
    while offset < pieces.len() {
        let mut any = false;
        for worker in 0..segments {
            let group: Vec<Arc<Piece>> = pieces[offset..]
                .iter()
                .skip(worker)
                .step_by(segments)
                .take(group_size)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            any = true;
            groups.push(group);
        }
        if !any {
            break;
        }
        offset += group_size * segments;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_piece_size_picks_smallest_fitting_exponent() {
        // 10 MiB at max_piece_count=1000: 2^20 -> 10 pieces, fits at i=20.
        let size = 10 * 1024 * 1024;
        assert_eq!(calc_piece_size(size, 20, 28, 1000), 1 << 20);
    }

    #[test]
    fn calc_piece_size_grows_for_large_resources() {
        // 100 GiB needs a bigger piece size to stay under 1000 pieces.
        let size = 100u64 * 1024 * 1024 * 1024;
        let chosen = calc_piece_size(size, 20, 28, 1000);
        assert!(size / chosen < 1000);
        assert!(chosen.is_power_of_two());
    }

    #[test]
    fn calc_piece_size_caps_at_max_log2() {
        // A resource so large that even 2^28 yields >= 1000 pieces: falls
        // back to the top of the range instead of growing unbounded.
        let size = u64::MAX / 2;
        assert_eq!(calc_piece_size(size, 20, 28, 1000), 1 << 28);
    }

    #[test]
    fn create_pieces_covers_full_range_with_last_piece_marked() {
        let pieces = create_pieces(1000, 0, 300);
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[0].start_byte, 0);
        assert_eq!(pieces[0].end_byte, 300);
        assert!(!pieces[0].last_piece);
        assert_eq!(pieces[3].start_byte, 900);
        assert_eq!(pieces[3].end_byte, 1000);
        assert!(pieces[3].last_piece);
    }

    #[test]
    fn create_pieces_respects_start_position() {
        let pieces = create_pieces(1000, 700, 300);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].start_byte, 700);
        assert_eq!(pieces[0].end_byte, 1000);
        assert!(pieces[0].last_piece);
    }

    #[test]
    fn create_pieces_empty_when_start_at_or_past_size() {
        assert!(create_pieces(1000, 1000, 300).is_empty());
        assert!(create_pieces(1000, 2000, 300).is_empty());
    }

    #[test]
    fn split_pieces_stripes_round_robin_across_segments() {
        let pieces = create_pieces(1000, 0, 100); // 10 pieces, indices 0..10
        let groups = split_pieces(&pieces, 3, 100);
        // 3 workers, group_size big enough to take everything in one pass:
        // worker 0 -> indices 0,3,6,9 (4), worker 1 -> 1,4,7 (3), worker 2 -> 2,5,8 (3)
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 4);
        assert_eq!(groups[0][0].index, 0);
        assert_eq!(groups[0][1].index, 3);
        assert_eq!(groups[1].len(), 3);
        assert_eq!(groups[1][0].index, 1);
        assert_eq!(groups[2].len(), 3);
        assert_eq!(groups[2][0].index, 2);
    }

    #[test]
    fn split_pieces_caps_group_size_and_continues() {
        let pieces = create_pieces(1000, 0, 100); // 10 pieces
        let groups = split_pieces(&pieces, 2, 2);
        // worker 0: indices 0,2 then 4,6 then 8 ; worker 1: 1,3 then 5,7 then 9
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, 10);
        for g in &groups {
            assert!(g.len() <= 2);
        }
    }

    #[test]
    fn split_pieces_empty_input() {
        let pieces: Vec<Arc<Piece>> = Vec::new();
        assert!(split_pieces(&pieces, 4, 10).is_empty());
    }
}
