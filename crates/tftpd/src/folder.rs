//! Directory-backed file backend
//!
//! Serves the files of one directory. Each resolve builds a fresh
//! [`FileHandle`] whose capabilities mirror filesystem access: readable if
//! the file opens for reading, writable if it is writable or does not exist
//! yet. Only plain filenames are accepted; anything containing a path
//! separator is refused, so requests can never leave the root directory.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tftp_engine::{BLOCK_SIZE, BlockSink, BlockSource, FileHandle, Resolver, TftpError};

/// Resolver serving the contents of a single directory.
#[derive(Debug, Clone)]
pub struct FolderResolver {
    root: PathBuf,
}

impl FolderResolver {
    /// Create a resolver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory being served.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl Resolver for FolderResolver {
    fn resolve(&mut self, filename: &str) -> Option<FileHandle> {
        // Only the root directory itself is servable; refusing separators
        // outright closes every traversal avenue.
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            tracing::debug!(%filename, "refusing non-plain filename");
            return None;
        }

        let path = self.root.join(filename);
        let file = Arc::new(FolderFile::new(path.clone()));

        let readable = File::open(&path).is_ok();
        let writable = match std::fs::metadata(&path) {
            Ok(meta) => !meta.permissions().readonly(),
            Err(_) => true, // absent: can be created
        };

        let mut handle = FileHandle::new(filename);
        if readable {
            handle = handle.with_source(file.clone());
        }
        if writable {
            handle = handle.with_sink(file);
        }
        Some(handle)
    }
}

/// One on-disk file accessed block by block
///
/// The OS file handle is opened lazily on the first block and closed again
/// once the transfer reaches its final (short) block, so an idle handle pins
/// nothing. Every access seeks to `(block - 1) * 512`, which makes repeated
/// calls for the same block naturally idempotent.
pub struct FolderFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FolderFile {
    /// Create a backend for `path` without touching the filesystem yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn block_start(block: u16) -> u64 {
    u64::from(block.wrapping_sub(1)) * BLOCK_SIZE as u64
}

impl BlockSource for FolderFile {
    fn read_block(&self, block: u16, buf: &mut [u8]) -> Result<usize, TftpError> {
        let mut guard = self.lock();
        let file = match &mut *guard {
            Some(file) => file,
            slot => {
                let file = File::open(&self.path)
                    .map_err(|_| TftpError::access_violation("Can't open file"))?;
                slot.insert(file)
            }
        };

        file.seek(SeekFrom::Start(block_start(block)))
            .map_err(|_| TftpError::access_violation("Can't read file"))?;

        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(TftpError::access_violation("Can't read file")),
            }
        }

        // A fully drained file is closed right away; most clients keep
        // reading until they see an empty block.
        if total == 0 {
            guard.take();
        }
        Ok(total)
    }

    fn abort(&self) {
        self.lock().take();
    }
}

impl BlockSink for FolderFile {
    fn write_block(&self, block: u16, data: &[u8]) -> Result<(), TftpError> {
        let mut guard = self.lock();
        let file = match &mut *guard {
            Some(file) => file,
            slot => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(block == 1)
                    .open(&self.path)
                    .map_err(|_| TftpError::access_violation("Can't open file"))?;
                slot.insert(file)
            }
        };

        file.seek(SeekFrom::Start(block_start(block)))
            .map_err(|_| TftpError::disk_full("Can't write"))?;
        file.write_all(data)
            .map_err(|_| TftpError::disk_full("Can't write"))?;

        // The final block closes storage.
        if data.len() < BLOCK_SIZE {
            if let Some(file) = guard.take() {
                let _ = file.sync_all();
            }
        }
        Ok(())
    }

    fn abort(&self) {
        // Close the handle; a partially written file stays on disk.
        self.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_resolver_refuses_paths() {
        let temp_dir = tempdir().unwrap();
        let mut resolver = FolderResolver::new(temp_dir.path());

        assert!(resolver.resolve("../../../etc/passwd").is_none());
        assert!(resolver.resolve("/etc/passwd").is_none());
        assert!(resolver.resolve("sub/file.txt").is_none());
        assert!(resolver.resolve("sub\\file.txt").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn test_resolver_capabilities() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("present.txt"), b"data").unwrap();
        let mut resolver = FolderResolver::new(temp_dir.path());

        let existing = resolver.resolve("present.txt").unwrap();
        assert!(existing.readable());
        assert!(existing.writable());

        // Absent files can be created but not read.
        let absent = resolver.resolve("new.bin").unwrap();
        assert!(!absent.readable());
        assert!(absent.writable());
    }

    #[test]
    fn test_read_blocks_walk_the_file() {
        let temp_dir = tempdir().unwrap();
        let content: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, &content).unwrap();

        let file = FolderFile::new(&path);
        let mut buf = [0u8; BLOCK_SIZE];

        assert_eq!(file.read_block(1, &mut buf).unwrap(), 512);
        assert_eq!(&buf[..512], &content[..512]);
        assert_eq!(file.read_block(2, &mut buf).unwrap(), 88);
        assert_eq!(&buf[..88], &content[512..]);
        assert_eq!(file.read_block(3, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, vec![7u8; 700]).unwrap();

        let file = FolderFile::new(&path);
        let mut first = [0u8; BLOCK_SIZE];
        let mut again = [0u8; BLOCK_SIZE];

        assert_eq!(file.read_block(2, &mut first).unwrap(), 188);
        assert_eq!(file.read_block(2, &mut again).unwrap(), 188);
        assert_eq!(first[..188], again[..188]);
    }

    #[test]
    fn test_read_missing_file_errors() {
        let temp_dir = tempdir().unwrap();
        let file = FolderFile::new(temp_dir.path().join("nope.bin"));
        let mut buf = [0u8; BLOCK_SIZE];

        let err = file.read_block(1, &mut buf).unwrap_err();
        assert_eq!(err.code, tftp_engine::ErrorCode::AccessViolation);
        assert_eq!(err.message, "Can't open file");
    }

    #[test]
    fn test_write_blocks_assemble_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.bin");

        let file = FolderFile::new(&path);
        file.write_block(1, &[1u8; 512]).unwrap();
        file.write_block(2, &[2u8; 100]).unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 612);
        assert_eq!(&written[..512], &[1u8; 512][..]);
        assert_eq!(&written[512..], &[2u8; 100][..]);

        // The short block closed the handle.
        assert!(file.lock().is_none());
    }

    #[test]
    fn test_write_block_one_truncates() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.bin");
        std::fs::write(&path, vec![9u8; 4096]).unwrap();

        let file = FolderFile::new(&path);
        file.write_block(1, b"short").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn test_abort_closes_handle() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, vec![1u8; 1024]).unwrap();

        let file = FolderFile::new(&path);
        let mut buf = [0u8; BLOCK_SIZE];
        file.read_block(1, &mut buf).unwrap();
        assert!(file.lock().is_some());

        BlockSource::abort(&file);
        assert!(file.lock().is_none());
    }
}
