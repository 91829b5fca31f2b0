//! Volume-successor naming: given one volume's name, compute the name of
//! the volume that continues it, under either the old (`.rNN`) or new
//! (`.partNN.rar`) RAR naming scheme. The archive's own main-header flag
//! (`NEWNUMBERING`) says which scheme is in force; detection of the scheme
//! from a bare filename (`is_first_volume`) is only used by `RarStreamer`
//! to recognize candidate first volumes before any header has been read.

/// Finds a `.partNNN.rar` (case-insensitive) suffix and returns the
/// filename up to `.part`, the numeric value, and the digit width (so the
/// successor can be formatted with the same zero-padding).
fn split_new_style(name: &str) -> Option<(&str, u32, usize)> {
    let lower = name.to_ascii_lowercase();
    if !lower.ends_with(".rar") {
        return None;
    }
    let before_rar = &lower[..lower.len() - 4];
    let part_at = before_rar.rfind(".part")?;
    let digits = &before_rar[part_at + 5..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    Some((&name[..part_at], number, digits.len()))
}

/// Finds a trailing `.rNN` (case-insensitive, two or more digits) suffix
/// and returns the filename up to the suffix and the numeric value, or
/// recognizes a bare `.rar` first volume (implicit number `-1`, so its
/// successor is `.r00`).
fn split_old_style(name: &str) -> Option<(&str, i64, usize)> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".rar") {
        return Some((&name[..name.len() - 4], -1, 2));
    }
    let dot = lower.rfind('.')?;
    let suffix = &lower[dot + 1..];
    if !suffix.starts_with('r') || suffix.len() < 2 {
        return None;
    }
    let digits = &suffix[1..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: i64 = digits.parse().ok()?;
    Some((&name[..dot], number, digits.len()))
}

/// Computes the new-scheme successor of `name` (`foo.part01.rar` ->
/// `foo.part02.rar`), or `None` if `name` isn't a recognizable new-style
/// volume name.
pub fn next_newvol_name(name: &str) -> Option<String> {
    let (prefix, number, width) = split_new_style(name)?;
    Some(format!("{prefix}.part{:0width$}.rar", number + 1, width = width))
}

/// Computes the old-scheme successor of `name` (`foo.rar` -> `foo.r00`,
/// `foo.r00` -> `foo.r01`), or `None` if `name` isn't a recognizable
/// old-style volume name.
pub fn next_oldvol_name(name: &str) -> Option<String> {
    let (prefix, number, width) = split_old_style(name)?;
    Some(format!("{prefix}.r{:0width$}", number + 1, width = width))
}

/// Which volume-naming scheme an archive uses, as declared by its
/// main-header `NEWNUMBERING` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    Old,
    New,
}

impl NamingScheme {
    pub fn next_name(self, current: &str) -> Option<String> {
        match self {
            NamingScheme::Old => next_oldvol_name(current),
            NamingScheme::New => next_newvol_name(current),
        }
    }
}

/// True if `id` looks like an old-style first volume: ends in `.rar`
/// (case-insensitively) and is not itself a `.partNN.rar` name.
pub fn is_old_style_first_volume(id: &str) -> bool {
    id.to_ascii_lowercase().ends_with(".rar") && split_new_style(id).is_none()
}

/// True if `id` is a new-style first volume: `.part01.rar` (the numeric
/// part, regardless of zero-padding width, equals 1).
pub fn is_new_style_first_volume(id: &str) -> bool {
    matches!(split_new_style(id), Some((_, 1, _)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_style_first_volume_detection() {
        assert!(is_old_style_first_volume("movie.rar"));
        assert!(is_old_style_first_volume("MOVIE.RAR"));
        assert!(!is_old_style_first_volume("movie.part01.rar"));
        assert!(!is_old_style_first_volume("movie.r00"));
    }

    #[test]
    fn new_style_first_volume_detection() {
        assert!(is_new_style_first_volume("movie.part01.rar"));
        assert!(is_new_style_first_volume("movie.part1.rar"));
        assert!(!is_new_style_first_volume("movie.part02.rar"));
        assert!(!is_new_style_first_volume("movie.rar"));
    }

    #[test]
    fn old_scheme_successor_chain() {
        assert_eq!(next_oldvol_name("movie.rar").as_deref(), Some("movie.r00"));
        assert_eq!(next_oldvol_name("movie.r00").as_deref(), Some("movie.r01"));
        assert_eq!(next_oldvol_name("movie.r09").as_deref(), Some("movie.r10"));
        assert_eq!(next_oldvol_name("movie.txt"), None);
    }

    #[test]
    fn new_scheme_successor_chain_preserves_width() {
        assert_eq!(
            next_newvol_name("movie.part01.rar").as_deref(),
            Some("movie.part02.rar")
        );
        assert_eq!(
            next_newvol_name("movie.part009.rar").as_deref(),
            Some("movie.part010.rar")
        );
        assert_eq!(next_newvol_name("movie.rar"), None);
    }

    #[test]
    fn naming_scheme_dispatches_to_right_rule() {
        assert_eq!(
            NamingScheme::New.next_name("movie.part01.rar").as_deref(),
            Some("movie.part02.rar")
        );
        assert_eq!(
            NamingScheme::Old.next_name("movie.rar").as_deref(),
            Some("movie.r00")
        );
    }
}
