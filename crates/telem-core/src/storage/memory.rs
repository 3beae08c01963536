use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use super::{LogStore, StorageError, validate_name};

/// RAM-backed [`LogStore`] for tests. Names are case-insensitive like FAT
/// short names; the failure switches exercise the error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
    mounted: bool,
    /// Total bytes the medium holds; `None` means unbounded.
    pub capacity: Option<usize>,
    /// Make every `mount` fail with [`StorageError::Device`].
    pub fail_mount: bool,
    /// Make every write-side operation fail with [`StorageError::Device`].
    pub fail_writes: bool,
    /// Make only `create` fail with [`StorageError::Device`], so a truncate
    /// can succeed at removing the old file and then fail to write the new one.
    pub fail_creates: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that is already mounted and holds `files`.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        let mut store = Self::new();
        for (name, contents) in files {
            store.files.insert(name.to_ascii_uppercase(), contents.to_vec());
        }
        store.mounted = true;
        store
    }

    pub fn contents(&self, name: &str) -> Option<&[u8]> {
        self.files.get(&name.to_ascii_uppercase()).map(Vec::as_slice)
    }

    /// Eject the medium, as if the card was pulled.
    pub fn unmount(&mut self) {
        self.mounted = false;
    }

    fn used(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    fn check(&self, name: &str) -> Result<String, StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        validate_name(name)?;
        Ok(name.to_ascii_uppercase())
    }

    fn check_write(&self, name: &str, growth: usize) -> Result<String, StorageError> {
        let key = self.check(name)?;
        if self.fail_writes {
            return Err(StorageError::Device);
        }
        if let Some(capacity) = self.capacity
            && self.used() + growth > capacity
        {
            return Err(StorageError::Full);
        }
        Ok(key)
    }
}

impl LogStore for MemoryStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.fail_mount {
            return Err(StorageError::Device);
        }
        self.mounted = true;
        Ok(())
    }

    fn exists(&mut self, name: &str) -> Result<bool, StorageError> {
        let key = self.check(name)?;
        Ok(self.files.contains_key(&key))
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        let key = self.check_write(name, 0)?;
        self.files
            .remove(&key)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn create(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        let existing = self
            .files
            .get(&name.to_ascii_uppercase())
            .map_or(0, Vec::len);
        let key = self.check_write(name, contents.len().saturating_sub(existing))?;
        if self.fail_creates {
            return Err(StorageError::Device);
        }
        self.files.insert(key, contents.to_vec());
        Ok(())
    }

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let key = self.check_write(name, bytes.len())?;
        self.files.entry(key).or_default().extend_from_slice(bytes);
        Ok(())
    }

    fn read_at(
        &mut self,
        name: &str,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let key = self.check(name)?;
        let file = self.files.get(&key).ok_or(StorageError::NotFound)?;
        let start = (offset as usize).min(file.len());
        let count = (file.len() - start).min(buf.len());
        buf[..count].copy_from_slice(&file[start..start + count]);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_need_a_mount() {
        let mut store = MemoryStore::new();
        assert_eq!(store.exists("LOG.TXT"), Err(StorageError::NotMounted));
        store.mount().unwrap();
        assert_eq!(store.exists("LOG.TXT"), Ok(false));
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut store = MemoryStore::with_files([("log.txt", &b"abc"[..])]);
        assert_eq!(store.exists("LOG.TXT"), Ok(true));
        store.append("Log.Txt", b"def").unwrap();
        assert_eq!(store.contents("LOG.TXT"), Some(&b"abcdef"[..]));
    }

    #[test]
    fn read_at_walks_the_file() {
        let mut store = MemoryStore::with_files([("A.TXT", &b"0123456789"[..])]);
        let mut buf = [0u8; 4];
        assert_eq!(store.read_at("A.TXT", 0, &mut buf), Ok(4));
        assert_eq!(&buf, b"0123");
        assert_eq!(store.read_at("A.TXT", 8, &mut buf), Ok(2));
        assert_eq!(&buf[..2], b"89");
        assert_eq!(store.read_at("A.TXT", 10, &mut buf), Ok(0));
        assert_eq!(store.read_at("A.TXT", 99, &mut buf), Ok(0));
        assert_eq!(
            store.read_at("B.TXT", 0, &mut buf),
            Err(StorageError::NotFound)
        );
    }

    #[test]
    fn capacity_limits_growth() {
        let mut store = MemoryStore::with_files([]);
        store.capacity = Some(8);
        store.create("A.TXT", b"12345").unwrap();
        assert_eq!(store.append("A.TXT", b"6789"), Err(StorageError::Full));
        // Truncating to a shorter file always fits.
        store.create("A.TXT", b"1").unwrap();
        store.append("A.TXT", b"2345678").unwrap();
    }

    #[test]
    fn line_that_does_not_fit_leaves_the_file_untouched() {
        let mut store = MemoryStore::with_files([("A.TXT", &b"head\n"[..])]);
        store.capacity = Some(10);
        // "12345" alone would fit, "12345\n" does not.
        assert_eq!(store.append_line("A.TXT", "12345"), Err(StorageError::Full));
        assert_eq!(store.contents("A.TXT"), Some(&b"head\n"[..]));

        store.append_line("A.TXT", "next").unwrap();
        assert_eq!(store.contents("A.TXT"), Some(&b"head\nnext\n"[..]));
    }

    #[test]
    fn remove_missing_file_is_not_found() {
        let mut store = MemoryStore::with_files([]);
        assert_eq!(store.remove("A.TXT"), Err(StorageError::NotFound));
    }
}
