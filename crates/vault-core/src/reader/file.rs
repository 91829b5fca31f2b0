//! C4: a thin random-access reader over a local file.

use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::PathBuf;

use super::Reader;
use crate::error::CoreResult;

/// Lazily opens its file on the first `seek` or `read`, and tracks position
/// itself so repeated small reads don't round-trip through the OS for the
/// current offset.
pub struct FileReader {
    path: PathBuf,
    file: Option<File>,
    pos: u64,
}

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            pos: 0,
        }
    }

    fn ensure_open(&mut self) -> CoreResult<&mut File> {
        if self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
        }
        Ok(self.file.as_mut().unwrap())
    }
}

impl Reader for FileReader {
    fn seek(&mut self, pos: u64) -> CoreResult<()> {
        self.pos = pos;
        if let Some(f) = self.file.as_mut() {
            f.seek(SeekFrom::Start(pos))?;
        }
        Ok(())
    }

    fn read(&mut self, num_bytes: usize) -> CoreResult<Vec<u8>> {
        let pos = self.pos;
        let f = self.ensure_open()?;
        f.seek(SeekFrom::Start(pos))?;
        let mut buf = vec![0u8; num_bytes];
        let n = f.read(&mut buf)?;
        buf.truncate(n);
        self.pos += n as u64;
        Ok(buf)
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn tell(&self) -> u64 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn reads_from_start_without_explicit_seek() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"0123456789").unwrap();
        let mut r = FileReader::new(f.path());
        assert_eq!(r.read(4).unwrap(), b"0123");
        assert_eq!(r.read(100).unwrap(), b"456789");
        assert_eq!(r.read(1).unwrap(), b"");
    }

    #[test]
    fn seek_then_read() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"abcdefghij").unwrap();
        let mut r = FileReader::new(f.path());
        r.seek(5).unwrap();
        assert_eq!(r.read(3).unwrap(), b"fgh");
        assert_eq!(r.tell(), 8);
    }

    #[test]
    fn close_then_reopen_on_next_read() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"xyz").unwrap();
        let mut r = FileReader::new(f.path());
        assert_eq!(r.read(1).unwrap(), b"x");
        r.close();
        assert_eq!(r.read(2).unwrap(), b"yz");
    }

    #[test]
    fn missing_file_errors_on_first_access() {
        let mut r = FileReader::new("/nonexistent/path/does-not-exist");
        assert!(r.read(1).is_err());
    }
}
