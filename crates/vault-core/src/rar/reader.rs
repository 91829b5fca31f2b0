//! C7: `VirtualRarReader`, the multi-volume RAR reader. Two modes:
//! `open_direct` streams a stored member across volumes as they're
//! opened in sequence, following the archive's own volume-successor
//! naming; `open_lazy` computes segment descriptors up front from just
//! the first volume's geometry and returns a `VirtualFileReader`, trading
//! a per-volume recovery-record tolerance check for random access.

use std::sync::Arc;

use super::header::{self, VolumeScan};
use super::volume::NamingScheme;
use crate::error::{CoreError, CoreResult};
use crate::item::{Attributes, Item, Router};
use crate::reader::virtual_file::{ItemOpener, Segment};
use crate::reader::{Reader, VirtualFileReader};

/// The relative difference tolerated between the first volume's trailing
/// fraction and the last volume's implied recovery-record fraction before
/// lazy mode's alignment check rejects the archive.
const RECOVERY_TOLERANCE_RATIO: f64 = 0.10;
/// The absolute byte delta that must *also* be exceeded for the relative
/// check to reject; a large archive can differ by 10% and still be within
/// a few bytes in absolute terms, which is noise, not misalignment.
const RECOVERY_TOLERANCE_BYTES: f64 = 10_000.0;

fn item_size(item: &Item) -> Option<u64> {
    item.attributes.get("size").and_then(|v| v.as_u64())
}

/// Routes `ItemOpener` calls through a `Router`, so `VirtualFileReader`
/// (used by lazy mode) doesn't need to know about routing at all.
struct RouterOpener {
    router: Arc<Router>,
}

impl ItemOpener for RouterOpener {
    fn open(&self, item: &Item) -> CoreResult<Box<dyn Reader>> {
        self.router
            .open(item, &Attributes::new())?
            .ok_or_else(|| CoreError::InvalidInput(format!("no route can open volume {}", item.id)))
    }
}

/// Resolves the Item named `name` among `directory`'s (freshly listed)
/// children, case-insensitively.
fn find_volume(router: &Router, directory: &Item, name: &str) -> CoreResult<Item> {
    let listed = router.list(directory, &Attributes::new())?;
    listed
        .children
        .unwrap_or_default()
        .into_iter()
        .find(|c| c.id.eq_ignore_ascii_case(name))
        .ok_or_else(|| CoreError::BadContainer(format!("missing successor volume {name}")))
}

fn open_and_scan(router: &Router, volume: &Item) -> CoreResult<(Box<dyn Reader>, VolumeScan)> {
    let mut reader = router
        .open(volume, &Attributes::new())?
        .ok_or_else(|| CoreError::InvalidInput(format!("no route can open volume {}", volume.id)))?;
    let scan = header::scan_volume(reader.as_mut())?;
    Ok((reader, scan))
}

/// Streams a stored member directly, opening one volume at a time and
/// following `FILE_SPLIT_AFTER` into the next.
pub struct DirectRarReader {
    router: Arc<Router>,
    directory: Item,
    naming_scheme: NamingScheme,
    member_name: String,
    current_volume: Item,
    current_reader: Box<dyn Reader>,
    remaining_in_volume: u64,
    split_after: bool,
    pos: u64,
    sought: bool,
}

impl DirectRarReader {
    /// Opens `first_volume` (a child of `directory`), parses its main and
    /// first-file headers, and is ready to stream that member's stored
    /// body from the start.
    pub fn open(router: Arc<Router>, directory: Item, first_volume: Item) -> CoreResult<Self> {
        let (reader, scan) = open_and_scan(&router, &first_volume)?;
        let naming_scheme = scan.naming_scheme.ok_or_else(|| {
            CoreError::BadContainer("archive's main header did not declare a naming scheme".into())
        })?;

        Ok(Self {
            router,
            directory,
            naming_scheme,
            member_name: scan.first_file.name,
            current_volume: first_volume,
            current_reader: reader,
            remaining_in_volume: scan.first_file.pack_size,
            split_after: scan.first_file.split_after,
            pos: 0,
            sought: false,
        })
    }

    fn advance_volume(&mut self) -> CoreResult<bool> {
        if !self.split_after {
            return Ok(false);
        }
        let next_name = self
            .naming_scheme
            .next_name(&self.current_volume.id)
            .ok_or_else(|| {
                CoreError::BadContainer(format!(
                    "no volume-naming rule applies to {}",
                    self.current_volume.id
                ))
            })?;
        let next_volume = find_volume(&self.router, &self.directory, &next_name)?;
        let (reader, scan) = open_and_scan(&self.router, &next_volume)?;
        if !scan.first_file.name.eq_ignore_ascii_case(&self.member_name) {
            return Err(CoreError::BadContainer(format!(
                "volume {} holds member {:?}, expected {:?}",
                next_volume.id, scan.first_file.name, self.member_name
            )));
        }

        self.current_reader.close();
        self.current_volume = next_volume;
        self.current_reader = reader;
        self.remaining_in_volume = scan.first_file.pack_size;
        self.split_after = scan.first_file.split_after;
        Ok(true)
    }
}

impl Reader for DirectRarReader {
    fn seek(&mut self, pos: u64) -> CoreResult<()> {
        if self.sought {
            return Err(CoreError::InvalidInput(
                "DirectRarReader seek is permitted exactly once".into(),
            ));
        }
        if pos != 0 {
            return Err(CoreError::InvalidInput(
                "DirectRarReader only supports seeking to 0; use lazy mode for random access".into(),
            ));
        }
        self.sought = true;
        Ok(())
    }

    fn read(&mut self, num_bytes: usize) -> CoreResult<Vec<u8>> {
        if !self.sought {
            self.seek(0)?;
        }
        loop {
            if self.remaining_in_volume == 0 {
                if !self.advance_volume()? {
                    return Ok(Vec::new());
                }
                continue;
            }
            let want = (num_bytes as u64).min(self.remaining_in_volume) as usize;
            let data = self.current_reader.read(want)?;
            if data.is_empty() {
                return Err(CoreError::BadContainer(
                    "volume ended before its declared member data was fully read".into(),
                ));
            }
            self.remaining_in_volume -= data.len() as u64;
            self.pos += data.len() as u64;
            return Ok(data);
        }
    }

    fn close(&mut self) {
        self.current_reader.close();
    }

    fn tell(&self) -> u64 {
        self.pos
    }
}

/// Builds a lazy-mode reader: one `VirtualFileReader` over segment
/// descriptors computed from the first volume's geometry, trading a
/// consistency (or recovery-record tolerance) check for random access
/// without opening every volume's header up front.
///
/// The member's total stored size across all volumes comes from the first
/// volume's own header: a split stored member's `unpack_size` field holds
/// the whole file's original size in every volume's copy of the header,
/// not just that volume's share of it.
pub fn open_lazy(router: Arc<Router>, directory: Item, first_volume: Item) -> CoreResult<VirtualFileReader> {
    let (mut reader, scan) = open_and_scan(&router, &first_volume)?;
    let naming_scheme = scan.naming_scheme.ok_or_else(|| {
        CoreError::BadContainer("archive's main header did not declare a naming scheme".into())
    })?;
    let header_offset = scan.first_file.data_offset;
    let tail_offset = header_offset + scan.first_file.pack_size;
    let total_size = scan.first_file.unpack_size;
    reader.close();

    let mut volumes = vec![first_volume.clone()];
    let mut current_name = first_volume.id.clone();
    loop {
        let Some(next_name) = naming_scheme.next_name(&current_name) else {
            break;
        };
        match find_volume(&router, &directory, &next_name) {
            Ok(item) => {
                current_name = item.id.clone();
                volumes.push(item);
            }
            Err(_) => break,
        }
    }

    let per_volume_len = tail_offset.saturating_sub(header_offset);
    let full_volume_count = volumes.len().saturating_sub(1);
    let sum_full_volumes = per_volume_len * full_volume_count as u64;
    if sum_full_volumes > total_size {
        return Err(CoreError::InvalidInput(
            "recovery record alignment failed: full volumes already exceed member size".into(),
        ));
    }
    let last_len = total_size - sum_full_volumes;

    check_alignment(&router, &volumes, scan.recovery_record, header_offset, last_len, total_size)?;

    let mut segments = Vec::with_capacity(volumes.len());
    for (i, volume) in volumes.iter().enumerate() {
        let is_last = i + 1 == volumes.len();
        let length = if is_last { last_len } else { per_volume_len };
        segments.push(Segment {
            item: Arc::new(volume.clone()),
            seek: header_offset,
            length,
        });
    }

    let opener: Arc<dyn ItemOpener> = Arc::new(RouterOpener { router });
    Ok(VirtualFileReader::new(opener, segments))
}

/// Without a recovery record, the segment lengths computed in `open_lazy`
/// sum to `total_size` by construction (checked there); this function only
/// has work to do when a recovery record makes that arithmetic unreliable.
fn check_alignment(
    router: &Router,
    volumes: &[Item],
    recovery_record: bool,
    header_offset: u64,
    last_len: u64,
    total_size: u64,
) -> CoreResult<()> {
    if !recovery_record {
        return Ok(());
    }

    let first = volumes
        .first()
        .ok_or_else(|| CoreError::InvalidInput("archive has no volumes to check".into()))?;
    let last = volumes
        .last()
        .ok_or_else(|| CoreError::InvalidInput("archive has no volumes to check".into()))?;

    let first_size = item_size(first)
        .or_else(|| {
            // Fall back to a fresh Router.list() lookup if the Item we were
            // handed predates a size attribute being filled in.
            router
                .list(first, &Attributes::new())
                .ok()
                .and_then(|i| item_size(&i))
        })
        .ok_or_else(|| CoreError::InvalidInput("first volume has no known size".into()))?;
    let last_size = item_size(last)
        .or_else(|| {
            router
                .list(last, &Attributes::new())
                .ok()
                .and_then(|i| item_size(&i))
        })
        .ok_or_else(|| CoreError::InvalidInput("last volume has no known size".into()))?;

    let first_fraction = (first_size.saturating_sub(header_offset)) as f64 / first_size.max(1) as f64;
    let implied_tail = header_offset + last_len;
    let last_fraction = (last_size.saturating_sub(implied_tail)) as f64 / last_size.max(1) as f64;

    let relative_diff = (first_fraction - last_fraction).abs() / first_fraction.max(1e-9);
    let absolute_delta = ((first_fraction - last_fraction).abs()) * total_size as f64;

    if relative_diff > RECOVERY_TOLERANCE_RATIO && absolute_delta > RECOVERY_TOLERANCE_BYTES {
        return Err(CoreError::InvalidInput(
            "recovery record alignment failed".into(),
        ));
    }
    Ok(())
}
