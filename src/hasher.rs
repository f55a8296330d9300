//! Streaming MD5 content hasher

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::ScanError;

/// Streams files through a fixed-size buffer into an MD5 digest
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    buff_size: usize,
}

impl ContentHasher {
    /// Create a hasher reading `buff_size` bytes per chunk
    pub fn new(buff_size: usize) -> Self {
        Self {
            buff_size: buff_size.max(1),
        }
    }

    /// Hash the file at `path`, returning the lowercase hex digest.
    ///
    /// Fails if the file cannot be opened or a read fails mid-stream,
    /// e.g. when the file is removed concurrently.
    pub fn hash(&self, path: &Path) -> Result<String, ScanError> {
        let mut file = File::open(path).map_err(|e| ScanError::from_io(path.to_path_buf(), &e))?;
        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; self.buff_size];

        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ScanError::hash_error(
                        path.to_path_buf(),
                        format!("read failed: {}", e),
                    ))
                }
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanErrorKind;
    use proptest::prelude::*;
    use std::fs;

    #[test]
    fn test_known_digests() {
        let dir = tempfile::tempdir().unwrap();
        let hello = dir.path().join("hello.txt");
        let empty = dir.path().join("empty.txt");
        fs::write(&hello, "hello").unwrap();
        fs::write(&empty, "").unwrap();

        let hasher = ContentHasher::new(65536);
        assert_eq!(
            hasher.hash(&hello).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            hasher.hash(&empty).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentHasher::new(16)
            .hash(&dir.path().join("gone.bin"))
            .unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::NotFound);
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, "hello").unwrap();
        assert_eq!(
            ContentHasher::new(0).hash(&path).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_chunk_size_does_not_change_digest(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            buff_size in 1usize..512,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("data.bin");
            fs::write(&path, &data).unwrap();

            let expected = format!("{:x}", Md5::digest(&data));
            prop_assert_eq!(ContentHasher::new(buff_size).hash(&path).unwrap(), expected);
        }
    }
}
