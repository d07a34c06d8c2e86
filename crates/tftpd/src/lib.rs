//! Example TFTP server glue
//!
//! Everything the engine deliberately leaves to its caller: concrete file
//! backends (a served directory, capacity-bounded RAM files) and a tokio UDP
//! loop that keys one engine session per peer address.
//!
//! - [`FolderResolver`] / [`FolderFile`]: serve the files of one directory
//! - [`MemoryFile`]: an in-memory read-write file for demos and tests
//! - [`TftpServer`] / [`run_folder_server`]: the UDP server loop

mod folder;
mod memory;
mod server;

pub use folder::*;
pub use memory::*;
pub use server::*;
