//! A mapped-or-buffered file: memory-map when the platform supports it,
//! fall back to reading the whole file into memory otherwise.

use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

enum Backing {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

/// A read-only view of a database file, backed by `mmap` when available.
/// Mirrors the `MmapFile` shape the rest of this codebase's readers use,
/// generalized to fall back to a plain in-memory buffer when mapping the
/// file fails (unsupported filesystem, zero-length file, ...).
pub struct MappedFile {
    backing: Backing,
}

impl MappedFile {
    /// Open `path`, memory-mapping it if possible.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let backing = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => Backing::Mapped(mmap),
            Err(_) => Backing::Buffered(std::fs::read(path.as_ref())?),
        };
        Ok(MappedFile { backing })
    }

    /// Whether this view is backed by an actual memory mapping (as
    /// opposed to the buffered fallback).
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// The full contents as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Buffered(buf) => &buf[..],
        }
    }

    /// Total size in bytes.
    pub fn size(&self) -> usize {
        self.as_slice().len()
    }

    /// A bounds-checked sub-slice, or `None` if `offset + length` would
    /// run past the end of the file.
    pub fn get_slice(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        if end > self.size() {
            return None;
        }
        Some(&self.as_slice()[offset..end])
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("size", &self.size())
            .field("is_mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_file(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn opens_and_exposes_contents() {
        let file = write_temp_file(b"hello, database");
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.size(), b"hello, database".len());
        assert_eq!(mapped.as_slice(), b"hello, database");
    }

    #[test]
    fn get_slice_is_bounds_checked() {
        let file = write_temp_file(&[1, 2, 3, 4, 5]);
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.get_slice(1, 2), Some(&[2u8, 3u8][..]));
        assert!(mapped.get_slice(4, 2).is_none());
        assert!(mapped.get_slice(10, 1).is_none());
    }

    #[test]
    fn nonexistent_file_is_an_error() {
        assert!(MappedFile::open("/nonexistent/path/to/file").is_err());
    }
}
