//! In-memory file backend
//!
//! A capacity-bounded RAM file implementing both block callbacks, useful for
//! demos and tests. Share one `Arc<MemoryFile>` between the source and sink
//! sides of a handle to get a read-write file.

use std::sync::{Arc, Mutex};

use tftp_engine::{BLOCK_SIZE, BlockSink, BlockSource, FileHandle, TftpError};

/// A file stored entirely in memory, at most `capacity` bytes long.
pub struct MemoryFile {
    data: Mutex<Vec<u8>>,
    capacity: usize,
}

impl MemoryFile {
    /// Create an empty file with the given capacity bound.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Create a file seeded with `contents` (truncated to `capacity`).
    pub fn with_contents(capacity: usize, contents: impl Into<Vec<u8>>) -> Self {
        let mut data: Vec<u8> = contents.into();
        data.truncate(capacity);
        Self {
            data: Mutex::new(data),
            capacity,
        }
    }

    /// Snapshot of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Build a read-write handle serving this file under `name`.
    pub fn handle(self: &Arc<Self>, name: impl Into<String>) -> FileHandle {
        FileHandle::new(name)
            .with_source(self.clone())
            .with_sink(self.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn block_offset(block: u16) -> usize {
    (u64::from(block.wrapping_sub(1)) * BLOCK_SIZE as u64) as usize
}

impl BlockSource for MemoryFile {
    fn read_block(&self, block: u16, buf: &mut [u8]) -> Result<usize, TftpError> {
        let data = self.lock();
        let offset = block_offset(block);
        if offset >= data.len() {
            return Ok(0);
        }
        let end = data.len().min(offset + BLOCK_SIZE);
        buf[..end - offset].copy_from_slice(&data[offset..end]);
        Ok(end - offset)
    }
}

impl BlockSink for MemoryFile {
    fn write_block(&self, block: u16, data: &[u8]) -> Result<(), TftpError> {
        let mut stored = self.lock();

        // Block 1 restarts the file, which also keeps a retransmitted or
        // repeated transfer idempotent.
        if block == 1 {
            stored.clear();
        }

        let offset = block_offset(block);
        let end = offset.checked_add(data.len()).unwrap_or(usize::MAX);
        if end > self.capacity {
            return Err(TftpError::disk_full(format!(
                "File larger than {} bytes isn't allowed",
                self.capacity
            )));
        }

        if stored.len() < end {
            stored.resize(end, 0);
        }
        stored[offset..end].copy_from_slice(data);
        Ok(())
    }
}
