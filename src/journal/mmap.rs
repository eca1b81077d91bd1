use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;

use crate::{Error, Result};

/// Shared read-write memory mapping of a journal file.
pub struct MmapFile {
    map: MmapMut,
}

impl MmapFile {
    /// Creates the file with `len` zero bytes and maps it. Fails with
    /// `AlreadyExists` if the file is present.
    pub fn create_new(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(len as u64)?;
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { map })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }

    pub fn range(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or(Error::Corrupt("mmap range overflow"))?;
        if end > self.map.len() {
            return Err(Error::Corrupt("mmap range out of bounds"));
        }
        Ok(&self.map[offset..end])
    }

    pub fn range_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or(Error::Corrupt("mmap range overflow"))?;
        if end > self.map.len() {
            return Err(Error::Corrupt("mmap range out of bounds"));
        }
        Ok(&mut self.map[offset..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_open_and_range() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");

        let mut created = MmapFile::create_new(&path, 256).expect("create");
        created.as_mut_slice()[10..14].copy_from_slice(b"asdf");

        let reopened = MmapFile::open(&path).expect("open");
        assert_eq!(reopened.len(), 256);
        assert_eq!(reopened.range(10, 4).expect("range"), b"asdf");
        assert!(reopened.range(250, 16).is_err());
    }

    #[test]
    fn create_new_refuses_existing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");
        MmapFile::create_new(&path, 64).expect("create");
        assert!(MmapFile::create_new(&path, 64).is_err());
    }
}
