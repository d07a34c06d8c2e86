//! TFTP (RFC 1350) server engine
//!
//! A minimal, callback-driven TFTP server core. The engine consumes raw
//! inbound datagrams, drives a per-session request/transfer state machine,
//! and emits outbound datagrams and error replies, while delegating all
//! real I/O to caller-supplied implementations:
//!
//! - [`Transport`]: sends one datagram to the already-known peer
//! - [`Resolver`]: maps a requested filename to a [`FileHandle`]
//! - [`BlockSource`] / [`BlockSink`]: read/write fixed 512-byte blocks
//!
//! The engine itself owns no sockets, no timers, and no session table: one
//! [`Session`] serves exactly one peer (one TID), and the caller keys
//! sessions by peer address. Transfers use octet mode only, with no option
//! negotiation; retransmission is the peer's job, tolerated through the
//! duplicate-block rule of RFC 1350.
//!
//! # Serving a file from memory
//!
//! ```
//! use std::sync::Arc;
//! use tftp_engine::{BlockSource, FileHandle, ListResolver, Session, TftpError, Transport};
//!
//! struct Greeting;
//!
//! impl BlockSource for Greeting {
//!     fn read_block(&self, block: u16, buf: &mut [u8]) -> Result<usize, TftpError> {
//!         let data: &[u8] = b"hello over tftp\n";
//!         if block > 1 {
//!             return Ok(0);
//!         }
//!         buf[..data.len()].copy_from_slice(data);
//!         Ok(data.len())
//!     }
//! }
//!
//! struct Replies(Vec<Vec<u8>>);
//!
//! impl Transport for Replies {
//!     fn send(&mut self, datagram: &[u8]) {
//!         self.0.push(datagram.to_vec());
//!     }
//! }
//!
//! let mut resolver = ListResolver::new();
//! resolver.push(FileHandle::new("greeting.txt").with_source(Arc::new(Greeting)));
//! let mut session = Session::new(Replies(Vec::new()), resolver);
//!
//! let mut rrq = vec![0x00, 0x01];
//! rrq.extend_from_slice(b"greeting.txt\0octet\0");
//! assert!(session.process(&rrq).is_accepted());
//!
//! let reply = session.transport().0.last().unwrap();
//! assert_eq!(&reply[..4], &[0x00, 0x03, 0x00, 0x01]); // DATA, block 1
//! assert_eq!(&reply[4..], b"hello over tftp\n");
//! ```

mod files;
mod protocol;
mod session;

pub use files::*;
pub use protocol::*;
pub use session::*;
