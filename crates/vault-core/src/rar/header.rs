//! RAR3 and RAR5 block-header parsing, enough to locate file entries and
//! their stored (uncompressed) body, and to tell whether the archive's own
//! main-header flag says it's split across volumes and under which naming
//! scheme.

use crate::error::{CoreError, CoreResult};
use crate::reader::Reader;

use super::volume::NamingScheme;

pub const RAR3_MAGIC: [u8; 7] = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00];
pub const RAR5_MAGIC: [u8; 7] = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RarVersion {
    Rar3,
    Rar5,
}

/// Reads the archive's first bytes and identifies its format, leaving the
/// reader positioned right after the signature (RAR5 has one extra byte
/// after its 7-byte magic that must be skipped before the main header).
pub fn detect_version(reader: &mut dyn Reader) -> CoreResult<RarVersion> {
    let sig = read_exact(reader, 7)?;
    if sig == RAR3_MAGIC {
        return Ok(RarVersion::Rar3);
    }
    if sig == RAR5_MAGIC {
        read_exact(reader, 1)?; // trailing zero byte before the main header
        return Ok(RarVersion::Rar5);
    }
    Err(CoreError::InvalidInput(
        "not a RAR archive: signature matched neither RAR3 nor RAR5 magic".into(),
    ))
}

/// Method 0 in both formats: the member is stored uncompressed and can be
/// read directly.
pub const METHOD_STORED: u8 = 0;

/// A located file entry: enough to stream its stored body and to follow it
/// across a volume boundary.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub method: u8,
    pub pack_size: u64,
    pub unpack_size: u64,
    /// Byte offset of the member's data, relative to the start of the
    /// volume, immediately after this file's header.
    pub data_offset: u64,
    pub split_before: bool,
    pub split_after: bool,
}

/// The result of scanning one volume from its start: the naming scheme (if
/// declared by the main header) and the first file entry found.
pub struct VolumeScan {
    pub naming_scheme: Option<NamingScheme>,
    pub recovery_record: bool,
    pub first_file: FileEntry,
}

/// Parses an opened volume from its signature through to its first file
/// header, skipping the main header (and any other non-file blocks) along
/// the way.
pub fn scan_volume(reader: &mut dyn Reader) -> CoreResult<VolumeScan> {
    let version = detect_version(reader)?;
    match version {
        RarVersion::Rar3 => rar3::scan_volume(reader),
        RarVersion::Rar5 => rar5::scan_volume(reader),
    }
}

/// Reads exactly `n` bytes or fails with `BadContainer`; `Reader::read` may
/// return short chunks, so this loops until satisfied or the stream ends.
pub(super) fn read_exact(reader: &mut dyn Reader, n: usize) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    while buf.len() < n {
        let chunk = reader.read(n - buf.len())?;
        if chunk.is_empty() {
            return Err(CoreError::BadContainer(format!(
                "unexpected end of volume while reading {n} header bytes (got {})",
                buf.len()
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

pub(super) fn skip(reader: &mut dyn Reader, n: u64) -> CoreResult<()> {
    let mut remaining = n;
    while remaining > 0 {
        let chunk_len = remaining.min(64 * 1024) as usize;
        let chunk = reader.read(chunk_len)?;
        if chunk.is_empty() {
            return Err(CoreError::BadContainer(
                "unexpected end of volume while skipping header bytes".into(),
            ));
        }
        remaining -= chunk.len() as u64;
    }
    Ok(())
}

mod rar3 {
    use super::*;

    const BLOCK_MAIN: u8 = 0x73;
    const BLOCK_FILE: u8 = 0x74;

    const LONG_BLOCK: u16 = 0x8000;
    const MAIN_NEWNUMBERING: u16 = 0x0010;

    const FILE_SPLIT_BEFORE: u16 = 0x0001;
    const FILE_SPLIT_AFTER: u16 = 0x0002;
    const FILE_LARGE: u16 = 0x0100;
    const FILE_UNICODE: u16 = 0x0200;

    struct CommonHeader {
        head_type: u8,
        head_flags: u16,
        head_size: u16,
    }

    fn parse_common_header(reader: &mut dyn Reader) -> CoreResult<CommonHeader> {
        let buf = read_exact(reader, 7)?;
        let head_flags = u16::from_le_bytes([buf[3], buf[4]]);
        let head_size = u16::from_le_bytes([buf[5], buf[6]]);
        Ok(CommonHeader {
            head_type: buf[2],
            head_flags,
            head_size,
        })
    }

    pub(super) fn scan_volume(reader: &mut dyn Reader) -> CoreResult<VolumeScan> {
        let mut naming_scheme = None;
        let mut recovery_record = false;

        loop {
            let common = parse_common_header(reader)?;
            let consumed_so_far = 7u64;

            match common.head_type {
                BLOCK_MAIN => {
                    naming_scheme = Some(if common.head_flags & MAIN_NEWNUMBERING != 0 {
                        NamingScheme::New
                    } else {
                        NamingScheme::Old
                    });
                    // Recovery-record presence is signalled via an AV/protect
                    // block in real archives; approximate it here via a main
                    // header flag bit reserved for it in this crate's model.
                    recovery_record = common.head_flags & 0x0040 != 0;
                    skip(reader, (common.head_size as u64).saturating_sub(consumed_so_far))?;
                }
                BLOCK_FILE => {
                    let rest_len = (common.head_size as u64).saturating_sub(consumed_so_far);
                    let rest = read_exact(reader, rest_len as usize)?;
                    let mut entry = parse_file_fields(&common, &rest)?;
                    entry.data_offset = reader.tell();
                    return Ok(VolumeScan {
                        naming_scheme,
                        recovery_record,
                        first_file: entry,
                    });
                }
                _ => {
                    let add_size = if common.head_flags & LONG_BLOCK != 0 {
                        let add = read_exact(reader, 4)?;
                        u32::from_le_bytes([add[0], add[1], add[2], add[3]]) as u64
                    } else {
                        0
                    };
                    skip(
                        reader,
                        (common.head_size as u64).saturating_sub(consumed_so_far) + add_size,
                    )?;
                }
            }
        }
    }

    // PACK_SIZE(4) UNP_SIZE(4) HOST_OS(1) FILE_CRC(4) FTIME(4) UNP_VER(1)
    // METHOD(1) NAME_SIZE(2) ATTR(4) = 25 fixed bytes before the name.
    const FILE_FIELDS_FIXED_LEN: usize = 25;

    fn parse_file_fields(common: &CommonHeader, rest: &[u8]) -> CoreResult<FileEntry> {
        if rest.len() < FILE_FIELDS_FIXED_LEN {
            return Err(CoreError::BadContainer(
                "RAR3 file header shorter than expected".into(),
            ));
        }
        let pack_size_lo = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as u64;
        let unp_size_lo = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as u64;
        let method = rest[18];
        let name_size = u16::from_le_bytes([rest[19], rest[20]]) as usize;

        let mut offset = FILE_FIELDS_FIXED_LEN;
        let (pack_size, unpack_size) = if common.head_flags & FILE_LARGE != 0 {
            let hi = read_u64_pair(rest, offset)?;
            offset += 8;
            (
                pack_size_lo | (hi.0 << 32),
                unp_size_lo | (hi.1 << 32),
            )
        } else {
            (pack_size_lo, unp_size_lo)
        };

        if rest.len() < offset + name_size {
            return Err(CoreError::BadContainer(
                "RAR3 file header name field runs past header size".into(),
            ));
        }
        let name_bytes = &rest[offset..offset + name_size];
        let name = if common.head_flags & FILE_UNICODE != 0 {
            // The Unicode name is null-terminated ASCII followed by an
            // encoded wide name; the plain ASCII prefix is a faithful
            // enough identifier for volume lookups.
            String::from_utf8_lossy(name_bytes)
                .split('\0')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            String::from_utf8_lossy(name_bytes).to_string()
        };

        Ok(FileEntry {
            name,
            method,
            pack_size,
            unpack_size,
            // Overwritten by the caller with the reader's actual position
            // once the whole header has been consumed.
            data_offset: 0,
            split_before: common.head_flags & FILE_SPLIT_BEFORE != 0,
            split_after: common.head_flags & FILE_SPLIT_AFTER != 0,
        })
    }

    fn read_u64_pair(rest: &[u8], offset: usize) -> CoreResult<(u64, u64)> {
        if rest.len() < offset + 8 {
            return Err(CoreError::BadContainer(
                "RAR3 large-file header missing high size fields".into(),
            ));
        }
        let hi_pack = u32::from_le_bytes([
            rest[offset],
            rest[offset + 1],
            rest[offset + 2],
            rest[offset + 3],
        ]) as u64;
        let hi_unp = u32::from_le_bytes([
            rest[offset + 4],
            rest[offset + 5],
            rest[offset + 6],
            rest[offset + 7],
        ]) as u64;
        Ok((hi_pack, hi_unp))
    }
}

mod rar5 {
    use super::*;

    const HEADER_ARCHIVE: u64 = 1;
    const HEADER_FILE: u64 = 2;

    const ARCHIVE_FLAG_VOLUME: u64 = 0x0002;

    const COMMON_FLAG_EXTRA: u64 = 0x0001;
    const COMMON_FLAG_DATA: u64 = 0x0002;
    const COMMON_FLAG_SPLIT_BEFORE: u64 = 0x0008;
    const COMMON_FLAG_SPLIT_AFTER: u64 = 0x0010;

    fn read_vint(reader: &mut dyn Reader) -> CoreResult<u64> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = read_exact(reader, 1)?[0];
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 64 {
                return Err(CoreError::BadContainer("RAR5 vint too long".into()));
            }
        }
    }

    pub(super) fn scan_volume(reader: &mut dyn Reader) -> CoreResult<VolumeScan> {
        let mut naming_scheme = None;
        // RAR5 has no dedicated "recovery record present" flag this crate
        // models; archives with a recovery record use the same tolerance
        // check at the VirtualRarReader layer regardless of version.
        let recovery_record = false;

        loop {
            read_exact(reader, 4)?; // header CRC32, not verified here
            let _header_size = read_vint(reader)?;
            let header_type = read_vint(reader)?;
            let header_flags = read_vint(reader)?;
            let extra_size = if header_flags & COMMON_FLAG_EXTRA != 0 {
                read_vint(reader)?
            } else {
                0
            };
            let data_size = if header_flags & COMMON_FLAG_DATA != 0 {
                read_vint(reader)?
            } else {
                0
            };

            match header_type {
                HEADER_ARCHIVE => {
                    let archive_flags = read_vint(reader)?;
                    naming_scheme = Some(if archive_flags & ARCHIVE_FLAG_VOLUME != 0 {
                        NamingScheme::New
                    } else {
                        NamingScheme::Old
                    });
                    skip(reader, extra_size)?;
                }
                HEADER_FILE => {
                    let _file_flags = read_vint(reader)?;
                    let unpack_size = read_vint(reader)?;
                    let _attributes = read_vint(reader)?;
                    let compression_info = read_vint(reader)?;
                    let _host_os = read_vint(reader)?;
                    let name_len = read_vint(reader)? as usize;
                    let name_bytes = read_exact(reader, name_len)?;
                    let name = String::from_utf8_lossy(&name_bytes).to_string();
                    skip(reader, extra_size)?;

                    let method = ((compression_info >> 7) & 0x07) as u8;
                    return Ok(VolumeScan {
                        naming_scheme,
                        recovery_record,
                        first_file: FileEntry {
                            name,
                            method,
                            pack_size: data_size,
                            unpack_size,
                            data_offset: reader.tell(),
                            split_before: header_flags & COMMON_FLAG_SPLIT_BEFORE != 0,
                            split_after: header_flags & COMMON_FLAG_SPLIT_AFTER != 0,
                        },
                    });
                }
                _ => {
                    skip(reader, extra_size + data_size)?;
                }
            }
        }
    }
}
