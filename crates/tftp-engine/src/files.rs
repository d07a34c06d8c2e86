//! Servable files and filename resolution
//!
//! The engine never touches storage itself: every transfer goes through a
//! [`FileHandle`], a named pair of optional block callbacks. A handle with
//! only a source is read-only, one with only a sink is write-only, and one
//! with neither cannot be served at all. Resolvers map a requested filename
//! to a handle and own all path policy (traversal rejection included).

use std::sync::Arc;

use crate::protocol::TftpError;

/// Read side of a file backend.
pub trait BlockSource: Send + Sync {
    /// Fill `buf` (512 bytes) with the data for 1-based `block`, i.e. the
    /// bytes at file offset `(block - 1) * 512`, and return how many bytes
    /// were produced. Returning fewer than 512 bytes (including exactly
    /// zero) signals end-of-file to the peer.
    ///
    /// Must be idempotent for repeated calls with the same block number:
    /// the engine re-reads a block when the peer retransmits its ACK.
    fn read_block(&self, block: u16, buf: &mut [u8]) -> Result<usize, TftpError>;

    /// Called when the engine abandons a transfer mid-read. Release any
    /// per-transfer resources here.
    fn abort(&self) {}
}

/// Write side of a file backend.
pub trait BlockSink: Send + Sync {
    /// Store `data` (at most 512 bytes) as 1-based `block`, i.e. at file
    /// offset `(block - 1) * 512`. A payload below 512 bytes is the final
    /// block of the transfer.
    ///
    /// Must tolerate a duplicate re-invocation of the previous block number
    /// without corrupting output: the engine re-writes a block when the peer
    /// retransmits it.
    fn write_block(&self, block: u16, data: &[u8]) -> Result<(), TftpError>;

    /// Called when the engine abandons a transfer mid-write.
    fn abort(&self) {}
}

/// Shared, type-erased read backend.
pub type SharedSource = Arc<dyn BlockSource>;

/// Shared, type-erased write backend.
pub type SharedSink = Arc<dyn BlockSink>;

/// One servable object: a name plus its optional read/write capabilities
///
/// Handles are cheap to clone (the backends live behind `Arc`); resolvers
/// hand out an owned clone per lookup and the session keeps it for as long
/// as the transfer lives.
#[derive(Clone)]
pub struct FileHandle {
    name: String,
    source: Option<SharedSource>,
    sink: Option<SharedSink>,
}

impl FileHandle {
    /// Create a handle with no capabilities yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            sink: None,
        }
    }

    /// Attach a read backend.
    pub fn with_source(mut self, source: SharedSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a write backend.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The filename this handle is served under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether read requests can be served from this handle.
    pub fn readable(&self) -> bool {
        self.source.is_some()
    }

    /// Whether write requests can be served to this handle.
    pub fn writable(&self) -> bool {
        self.sink.is_some()
    }

    pub(crate) fn read_block(&self, block: u16, buf: &mut [u8]) -> Result<usize, TftpError> {
        match &self.source {
            Some(source) => source.read_block(block, buf),
            None => Err(TftpError::access_violation("File is not readable")),
        }
    }

    pub(crate) fn write_block(&self, block: u16, data: &[u8]) -> Result<(), TftpError> {
        match &self.sink {
            Some(sink) => sink.write_block(block, data),
            None => Err(TftpError::access_violation("File is not writable")),
        }
    }

    pub(crate) fn abort_read(&self) {
        if let Some(source) = &self.source {
            source.abort();
        }
    }

    pub(crate) fn abort_write(&self) {
        if let Some(sink) = &self.sink {
            sink.abort();
        }
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("readable", &self.readable())
            .field("writable", &self.writable())
            .finish()
    }
}

/// Maps a requested filename to a servable handle
///
/// The engine performs no path interpretation of its own; rejecting
/// traversal attempts (or any other policy) is the resolver's job.
pub trait Resolver {
    /// Look up `filename`, returning a handle scoped to the caller.
    fn resolve(&mut self, filename: &str) -> Option<FileHandle>;
}

/// Resolver over a fixed list of handles
///
/// Scans the list in order and returns the first handle whose name matches
/// exactly (case-sensitive equality, no globbing, no path logic).
///
/// # Examples
/// ```
/// use tftp_engine::{FileHandle, ListResolver, Resolver};
///
/// let mut resolver = ListResolver::new();
/// resolver.push(FileHandle::new("boot.img"));
///
/// assert!(resolver.resolve("boot.img").is_some());
/// assert!(resolver.resolve("BOOT.IMG").is_none());
/// ```
#[derive(Default, Clone)]
pub struct ListResolver {
    files: Vec<FileHandle>,
}

impl ListResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle to the list.
    pub fn push(&mut self, handle: FileHandle) {
        self.files.push(handle);
    }

    /// Number of handles in the list.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Resolver for ListResolver {
    fn resolve(&mut self, filename: &str) -> Option<FileHandle> {
        self.files.iter().find(|f| f.name() == filename).cloned()
    }
}
