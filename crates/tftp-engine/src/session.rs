//! Per-session protocol engine
//!
//! A [`Session`] drives one logical transfer stream: feed it every datagram
//! received from one peer and it parses the packet, advances the transfer
//! state machine, and sends at most one reply (ACK, DATA, or ERROR) through
//! the caller-supplied [`Transport`]. All storage access goes through the
//! [`FileHandle`] returned by the session's [`Resolver`].
//!
//! The engine is fully synchronous and tracks exactly one in-flight transfer.
//! Serving several peers means one `Session` per peer (per TID); the caller
//! owns that table and must not call [`Session::process`] concurrently
//! against the same instance.

use crate::files::{FileHandle, Resolver};
use crate::protocol::{
    BLOCK_SIZE, ErrorCode, MIN_PACKET_LEN, OCTET, Opcode, build_ack, build_data, build_error,
    parse_request,
};

/// Outbound datagram sink for one session
///
/// Fire-and-forget: the datagram goes to the peer the caller's transport
/// layer already knows, and the engine consults no delivery status.
pub trait Transport {
    /// Send one datagram to the peer.
    fn send(&mut self, datagram: &[u8]);
}

/// Result of feeding one datagram to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The packet advanced the session; any reply has already been sent.
    Accepted,
    /// The packet was rejected and an ERROR reply was sent to the peer.
    Rejected,
}

impl Outcome {
    /// Whether the packet was accepted.
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

struct ActiveTransfer {
    file: FileHandle,
    op: Direction,
    expected_block: u16,
}

impl ActiveTransfer {
    fn abort(self) {
        match self.op {
            Direction::Read => self.file.abort_read(),
            Direction::Write => self.file.abort_write(),
        }
    }
}

/// One TFTP server session
///
/// Owns the transport, the resolver, and the state of the active transfer
/// (if any). Created by the caller before the first packet and kept alive
/// for as long as the peer is; the engine never destroys it.
pub struct Session<T: Transport, R: Resolver> {
    transport: T,
    resolver: R,
    transfer: Option<ActiveTransfer>,
}

impl<T: Transport, R: Resolver> Session<T, R> {
    /// Create an idle session.
    pub fn new(transport: T, resolver: R) -> Self {
        Self {
            transport,
            resolver,
            transfer: None,
        }
    }

    /// Whether no transfer is in progress.
    pub fn is_idle(&self) -> bool {
        self.transfer.is_none()
    }

    /// Abandon any active transfer, notifying the backend's abort hook.
    pub fn reset(&mut self) {
        self.abort_transfer();
    }

    /// Get the session's transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the session's transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Process one received datagram
    ///
    /// The sole entry point: parses the packet, mutates the session state,
    /// and sends zero or one reply before returning. Protocol-level failures
    /// are reported to the peer as ERROR packets, never to the local caller;
    /// the returned [`Outcome`] only says whether the packet was accepted.
    pub fn process(&mut self, datagram: &[u8]) -> Outcome {
        if datagram.len() < MIN_PACKET_LEN {
            self.send_error(ErrorCode::IllegalOperation, "Packet too short");
            return Outcome::Rejected;
        }

        let opcode = u16::from_be_bytes([datagram[0], datagram[1]]);
        match Opcode::from_u16(opcode) {
            Some(Opcode::ReadRequest) => self.handle_request(Direction::Read, &datagram[2..]),
            Some(Opcode::WriteRequest) => self.handle_request(Direction::Write, &datagram[2..]),
            Some(Opcode::Acknowledgment) => self.handle_ack(datagram),
            Some(Opcode::Data) => self.handle_data(datagram),
            _ => {
                tracing::debug!(opcode, "unsupported opcode");
                self.send_error(ErrorCode::IllegalOperation, "Unsupported operation");
                Outcome::Rejected
            }
        }
    }

    /// Handle an RRQ or WRQ. Accepted from any state; the active transfer is
    /// replaced only once the request is fully validated.
    fn handle_request(&mut self, op: Direction, body: &[u8]) -> Outcome {
        let Ok((filename, mode)) = parse_request(body) else {
            self.send_error(ErrorCode::IllegalOperation, "Invalid packet");
            return Outcome::Rejected;
        };

        if mode != OCTET {
            tracing::debug!(%filename, %mode, "unsupported transfer mode");
            self.send_error(ErrorCode::IllegalOperation, "Only octet mode is supported");
            return Outcome::Rejected;
        }

        let Some(file) = self.resolver.resolve(&filename) else {
            tracing::debug!(%filename, "file not found");
            self.send_error(ErrorCode::FileNotFound, "File not found");
            return Outcome::Rejected;
        };

        let capable = match op {
            Direction::Read => file.readable(),
            Direction::Write => file.writable(),
        };
        if !capable {
            tracing::debug!(%filename, ?op, "requested capability unavailable");
            self.send_error(
                ErrorCode::IllegalOperation,
                "Current operation is unavailable for this file",
            );
            return Outcome::Rejected;
        }

        // Request is good: replace whatever transfer was active.
        self.abort_transfer();
        self.transfer = Some(ActiveTransfer {
            file,
            op,
            expected_block: 1,
        });

        match op {
            Direction::Write => {
                tracing::debug!(%filename, "write request accepted");
                let packet = build_ack(0);
                self.transport.send(&packet);
                Outcome::Accepted
            }
            Direction::Read => {
                tracing::debug!(%filename, "read request accepted");
                if self.send_data_block(1) {
                    Outcome::Accepted
                } else {
                    Outcome::Rejected
                }
            }
        }
    }

    /// Handle an ACK: valid only while a read transfer is active.
    fn handle_ack(&mut self, datagram: &[u8]) -> Outcome {
        match &self.transfer {
            Some(t) if t.op == Direction::Read => {}
            _ => {
                self.send_error(ErrorCode::IllegalOperation, "No active read operation");
                return Outcome::Rejected;
            }
        }

        let block = u16::from_be_bytes([datagram[2], datagram[3]]);
        if self.validate_block(block).is_none() {
            return Outcome::Rejected;
        }

        // After the increment logic the expected block is the one to serve
        // next; on a duplicate ACK this re-sends the same block as before.
        let next = self
            .transfer
            .as_ref()
            .map(|t| t.expected_block)
            .unwrap_or_default();
        if self.send_data_block(next) {
            Outcome::Accepted
        } else {
            Outcome::Rejected
        }
    }

    /// Handle a DATA packet: valid only while a write transfer is active.
    fn handle_data(&mut self, datagram: &[u8]) -> Outcome {
        match &self.transfer {
            Some(t) if t.op == Direction::Write => {}
            _ => {
                self.send_error(ErrorCode::IllegalOperation, "No active write operation");
                return Outcome::Rejected;
            }
        }

        let block = u16::from_be_bytes([datagram[2], datagram[3]]);
        let Some(block) = self.validate_block(block) else {
            return Outcome::Rejected;
        };

        let payload = &datagram[4..];
        let result = match &self.transfer {
            Some(t) => t.file.write_block(block, payload),
            None => unreachable!("write transfer checked above"),
        };
        if let Err(err) = result {
            tracing::warn!(%err, block, "write backend failed");
            let packet = build_error(err.code, &err.message);
            self.transport.send(&packet);
            self.abort_transfer();
            return Outcome::Rejected;
        }

        let packet = build_ack(block);
        self.transport.send(&packet);
        Outcome::Accepted
    }

    /// Apply the block sequencing rule to an incoming ACK/DATA block number.
    ///
    /// Accepts the awaited block (and advances the counter) or a duplicate
    /// retransmission of the previous one (counter untouched, so the caller
    /// re-acks or re-sends without corrupting the sequence). Anything else
    /// aborts the transfer.
    fn validate_block(&mut self, received: u16) -> Option<u16> {
        let expected = self.transfer.as_ref()?.expected_block;

        if received != expected && received != expected.wrapping_sub(1) {
            tracing::warn!(received, expected, "unexpected block number");
            self.send_error(ErrorCode::IllegalOperation, "Unexpected block number");
            self.abort_transfer();
            return None;
        }

        if received == expected
            && let Some(t) = &mut self.transfer
        {
            t.expected_block = expected.wrapping_add(1);
        }
        Some(received)
    }

    /// Read one block from the active file and send it as DATA, or forward
    /// the backend's error and abort. Returns whether DATA went out.
    fn send_data_block(&mut self, block: u16) -> bool {
        let mut buf = [0u8; BLOCK_SIZE];
        let result = match &self.transfer {
            Some(t) => t.file.read_block(block, &mut buf),
            None => return false,
        };

        match result {
            Ok(len) => {
                let len = len.min(BLOCK_SIZE);
                let packet = build_data(block, &buf[..len]);
                self.transport.send(&packet);
                true
            }
            Err(err) => {
                tracing::warn!(%err, block, "read backend failed");
                let packet = build_error(err.code, &err.message);
                self.transport.send(&packet);
                self.abort_transfer();
                false
            }
        }
    }

    fn send_error(&mut self, code: ErrorCode, message: &str) {
        let packet = build_error(code, message);
        self.transport.send(&packet);
    }

    fn abort_transfer(&mut self) {
        if let Some(transfer) = self.transfer.take() {
            transfer.abort();
        }
    }
}

impl<T: Transport, R: Resolver> std::fmt::Debug for Session<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("idle", &self.is_idle())
            .finish_non_exhaustive()
    }
}
