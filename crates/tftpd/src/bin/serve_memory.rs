//! In-memory TFTP server demo
//!
//! Publishes two read-write RAM files, `file1` and `file2`, each capped at
//! 1 KiB. Clients can fetch the seeded contents or overwrite them; nothing
//! touches the disk.

use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;
use tftp_engine::ListResolver;
use tftpd::{MemoryFile, ServerConfig, TftpServer};

const MAX_FILE_SIZE: usize = 1024;

const FILE1_CONTENT: &[u8] = b"This is the file1 test content\n";
const FILE2_CONTENT: &[u8] = b"This is the file2 test content\n";

#[derive(FromArgs, Debug)]
#[argh(description = "TFTP server demo - serves two in-memory files (file1, file2)")]
struct CliConfig {
    #[argh(
        option,
        short = 'b',
        description = "server bind address",
        default = "ServerConfig::default().bind_address"
    )]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config: CliConfig = argh::from_env();

    let file1 = Arc::new(MemoryFile::with_contents(MAX_FILE_SIZE, FILE1_CONTENT));
    let file2 = Arc::new(MemoryFile::with_contents(MAX_FILE_SIZE, FILE2_CONTENT));

    let mut resolver = ListResolver::new();
    resolver.push(file1.handle("file1"));
    resolver.push(file2.handle("file2"));

    let mut server = TftpServer::with_resolver(config.bind, resolver);
    server.run().await
}
