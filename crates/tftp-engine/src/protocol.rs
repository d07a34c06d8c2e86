//! TFTP wire format
//!
//! Opcodes, error codes, and the packet framing/parsing helpers shared by the
//! session engine. All packets carry a 2-byte big-endian opcode followed by a
//! 2-byte big-endian argument (block number for DATA/ACK, error code for
//! ERROR) or, for RRQ/WRQ, two NUL-terminated strings (filename and mode).

use std::fmt;

use anyhow::{Result, anyhow};

/// Fixed TFTP data block size (RFC 1350).
pub const BLOCK_SIZE: usize = 512;

/// Minimum length of any valid TFTP packet (opcode + argument).
pub const MIN_PACKET_LEN: usize = 4;

/// Longest ERROR message that still fits a 512-byte datagram
/// (4-byte header + message + trailing NUL).
pub const MAX_ERROR_MESSAGE: usize = BLOCK_SIZE - MIN_PACKET_LEN - 1;

/// The only transfer mode this engine speaks. The comparison is
/// case-sensitive: `"octet"` exactly, nothing else.
pub const OCTET: &str = "octet";

/// TFTP protocol opcodes
///
/// Each opcode identifies one packet format as defined in RFC 1350.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Read Request (RRQ) - Opcode 1
    ///
    /// Client requests to read a file from the server. Contains filename and
    /// transfer mode as NUL-terminated strings.
    ReadRequest = 1,

    /// Write Request (WRQ) - Opcode 2
    ///
    /// Client requests to write a file to the server. Same layout as RRQ.
    WriteRequest = 2,

    /// Data Packet (DATA) - Opcode 3
    ///
    /// A block of file data: 2-byte block number and up to 512 payload bytes.
    /// The last packet of a transfer carries fewer than 512 bytes.
    Data = 3,

    /// Acknowledgment (ACK) - Opcode 4
    ///
    /// Acknowledges receipt of a data packet by block number. ACK with block
    /// number 0 acknowledges a write request.
    Acknowledgment = 4,

    /// Error Packet (ERROR) - Opcode 5
    ///
    /// An error code and a NUL-terminated human-readable message. Terminates
    /// the current transfer.
    Error = 5,
}

impl Opcode {
    /// Convert a u16 value to an Opcode
    ///
    /// # Examples
    /// ```
    /// use tftp_engine::Opcode;
    ///
    /// assert_eq!(Opcode::from_u16(1), Some(Opcode::ReadRequest));
    /// assert_eq!(Opcode::from_u16(99), None);
    /// ```
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ReadRequest),
            2 => Some(Self::WriteRequest),
            3 => Some(Self::Data),
            4 => Some(Self::Acknowledgment),
            5 => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert the opcode to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the conventional short name of the opcode
    ///
    /// # Examples
    /// ```
    /// use tftp_engine::Opcode;
    ///
    /// assert_eq!(Opcode::ReadRequest.name(), "RRQ");
    /// assert_eq!(Opcode::Data.name(), "DATA");
    /// ```
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadRequest => "RRQ",
            Self::WriteRequest => "WRQ",
            Self::Data => "DATA",
            Self::Acknowledgment => "ACK",
            Self::Error => "ERROR",
        }
    }
}

impl From<Opcode> for u16 {
    fn from(opcode: Opcode) -> Self {
        opcode.as_u16()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// TFTP error codes
///
/// Standard error codes as defined in RFC 1350.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Error code 0: Not defined
    ///
    /// Generic error condition; the message carries the details. Also the
    /// taxonomy's "no error" sentinel for backends with nothing better.
    NotDefined = 0,

    /// Error code 1: File not found
    FileNotFound = 1,

    /// Error code 2: Access violation
    ///
    /// The peer lacks permission for the requested file or operation.
    AccessViolation = 2,

    /// Error code 3: Disk full or allocation exceeded
    DiskFull = 3,

    /// Error code 4: Illegal TFTP operation
    ///
    /// Malformed or unsupported request. Every protocol violation the engine
    /// detects itself surfaces under this code.
    IllegalOperation = 4,

    /// Error code 5: Unknown transfer ID
    ///
    /// Packet received from an unexpected source port or peer.
    UnknownTransferId = 5,

    /// Error code 6: File already exists
    FileAlreadyExists = 6,

    /// Error code 7: No such user
    NoSuchUser = 7,
}

impl ErrorCode {
    /// Convert a u16 value to an ErrorCode
    ///
    /// # Examples
    /// ```
    /// use tftp_engine::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::from_u16(1), Some(ErrorCode::FileNotFound));
    /// assert_eq!(ErrorCode::from_u16(99), None);
    /// ```
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::NotDefined),
            1 => Some(Self::FileNotFound),
            2 => Some(Self::AccessViolation),
            3 => Some(Self::DiskFull),
            4 => Some(Self::IllegalOperation),
            5 => Some(Self::UnknownTransferId),
            6 => Some(Self::FileAlreadyExists),
            7 => Some(Self::NoSuchUser),
            _ => None,
        }
    }

    /// Convert the error code to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the default error message for this error code
    ///
    /// # Examples
    /// ```
    /// use tftp_engine::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::FileNotFound.default_message(), "File not found");
    /// ```
    pub fn default_message(self) -> &'static str {
        match self {
            Self::NotDefined => "Undefined error",
            Self::FileNotFound => "File not found",
            Self::AccessViolation => "Access violation",
            Self::DiskFull => "Disk full or allocation exceeded",
            Self::IllegalOperation => "Illegal TFTP operation",
            Self::UnknownTransferId => "Unknown transfer ID",
            Self::FileAlreadyExists => "File already exists",
            Self::NoSuchUser => "No such user",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(error_code: ErrorCode) -> Self {
        error_code.as_u16()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.as_u16())
    }
}

/// A TFTP error as carried by ERROR packets: code plus human-readable message
///
/// File backends report failures with this type; the engine forwards them to
/// the peer verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TftpError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl TftpError {
    /// Create a new error with a custom message
    ///
    /// # Examples
    /// ```
    /// use tftp_engine::{ErrorCode, TftpError};
    ///
    /// let error = TftpError::new(ErrorCode::FileNotFound, "boot.img not found");
    /// assert_eq!(error.code, ErrorCode::FileNotFound);
    /// assert_eq!(error.message, "boot.img not found");
    /// ```
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a new error with the default message for the error code
    pub fn with_default_message(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Convenience constructor for file not found
    pub fn file_not_found() -> Self {
        Self::with_default_message(ErrorCode::FileNotFound)
    }

    /// Convenience constructor for access violation with a custom message
    pub fn access_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessViolation, message)
    }

    /// Convenience constructor for disk full with a custom message
    pub fn disk_full(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DiskFull, message)
    }
}

impl fmt::Display for TftpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for TftpError {}

/// Find the next NUL byte in a buffer starting from a given position
pub fn find_zero(buf: &[u8], start: usize) -> Option<usize> {
    buf[start..].iter().position(|&b| b == 0).map(|pos| start + pos)
}

/// Parse the body of an RRQ/WRQ packet (the bytes after the 2-byte opcode)
///
/// Returns the (filename, mode) pair. Both strings must be NUL-terminated
/// UTF-8. Anything after the mode terminator (for instance RFC 2347 option
/// lists sent by real clients) is ignored; this engine negotiates nothing.
pub fn parse_request(body: &[u8]) -> Result<(String, String)> {
    let fname_end = find_zero(body, 0).ok_or_else(|| anyhow!("filename not terminated"))?;
    let filename = std::str::from_utf8(&body[..fname_end])?.to_string();

    let mode_start = fname_end + 1;
    let mode_end = find_zero(body, mode_start).ok_or_else(|| anyhow!("mode not terminated"))?;
    let mode = std::str::from_utf8(&body[mode_start..mode_end])?.to_string();

    Ok((filename, mode))
}

/// Build a TFTP DATA packet
pub fn build_data(block: u16, payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(MIN_PACKET_LEN + payload.len());
    v.extend_from_slice(&Opcode::Data.as_u16().to_be_bytes());
    v.extend_from_slice(&block.to_be_bytes());
    v.extend_from_slice(payload);
    v
}

/// Build a TFTP ACK packet
pub fn build_ack(block: u16) -> Vec<u8> {
    let mut v = Vec::with_capacity(MIN_PACKET_LEN);
    v.extend_from_slice(&Opcode::Acknowledgment.as_u16().to_be_bytes());
    v.extend_from_slice(&block.to_be_bytes());
    v
}

/// Build a TFTP ERROR packet
///
/// The message is truncated to [`MAX_ERROR_MESSAGE`] bytes so the framed
/// packet always fits a 512-byte datagram.
pub fn build_error(code: ErrorCode, message: &str) -> Vec<u8> {
    let msg = truncate_at_boundary(message, MAX_ERROR_MESSAGE);
    let mut v = Vec::with_capacity(MIN_PACKET_LEN + msg.len() + 1);
    v.extend_from_slice(&Opcode::Error.as_u16().to_be_bytes());
    v.extend_from_slice(&code.as_u16().to_be_bytes());
    v.extend_from_slice(msg.as_bytes());
    v.push(0);
    v
}

/// Get the opcode from a TFTP packet, if it has one
pub fn get_opcode(buf: &[u8]) -> Option<Opcode> {
    if buf.len() >= 2 {
        Opcode::from_u16(u16::from_be_bytes([buf[0], buf[1]]))
    } else {
        None
    }
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(Opcode::ReadRequest.as_u16(), 1);
        assert_eq!(Opcode::Error.as_u16(), 5);
        assert_eq!(Opcode::from_u16(2), Some(Opcode::WriteRequest));
        assert_eq!(Opcode::from_u16(6), None);
        assert_eq!(Opcode::from_u16(99), None);
    }

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::FileNotFound.as_u16(), 1);
        assert_eq!(ErrorCode::from_u16(4), Some(ErrorCode::IllegalOperation));
        assert_eq!(ErrorCode::from_u16(8), None);
        assert_eq!(ErrorCode::FileNotFound.default_message(), "File not found");
    }

    #[test]
    fn test_tftp_error_constructors() {
        let error = TftpError::new(ErrorCode::DiskFull, "out of space");
        assert_eq!(error.code, ErrorCode::DiskFull);
        assert_eq!(error.message, "out of space");

        let error = TftpError::with_default_message(ErrorCode::AccessViolation);
        assert_eq!(error.message, "Access violation");

        assert_eq!(TftpError::file_not_found().code, ErrorCode::FileNotFound);
        assert_eq!(TftpError::access_violation("no").code, ErrorCode::AccessViolation);
        assert_eq!(TftpError::disk_full("full").code, ErrorCode::DiskFull);
    }

    #[test]
    fn test_find_zero() {
        let buf = b"hello\0world\0";
        assert_eq!(find_zero(buf, 0), Some(5));
        assert_eq!(find_zero(buf, 6), Some(11));
        assert_eq!(find_zero(buf, 12), None);
    }

    #[test]
    fn test_parse_request_basic() {
        let (filename, mode) = parse_request(b"test.txt\0octet\0").unwrap();
        assert_eq!(filename, "test.txt");
        assert_eq!(mode, "octet");
    }

    #[test]
    fn test_parse_request_ignores_trailing_options() {
        let mut body = b"boot.img\0octet\0".to_vec();
        body.extend_from_slice(b"blksize\0");
        body.extend_from_slice(b"1400\0");

        let (filename, mode) = parse_request(&body).unwrap();
        assert_eq!(filename, "boot.img");
        assert_eq!(mode, "octet");
    }

    #[test]
    fn test_parse_request_malformed() {
        assert!(parse_request(b"no-terminator").is_err());
        assert!(parse_request(b"file.txt\0octet").is_err());
        assert!(parse_request(b"").is_err());
        assert!(parse_request(&[0xff, 0xfe, 0x00, b'o', 0x00]).is_err());
    }

    #[test]
    fn test_build_data() {
        let payload = b"Hello, TFTP!";
        let packet = build_data(1, payload);

        assert_eq!(packet.len(), 4 + payload.len());
        assert_eq!(u16::from_be_bytes([packet[0], packet[1]]), Opcode::Data.as_u16());
        assert_eq!(u16::from_be_bytes([packet[2], packet[3]]), 1);
        assert_eq!(&packet[4..], payload);
    }

    #[test]
    fn test_build_data_empty() {
        let packet = build_data(7, &[]);
        assert_eq!(packet.len(), 4);
        assert_eq!(u16::from_be_bytes([packet[2], packet[3]]), 7);
    }

    #[test]
    fn test_build_ack() {
        let packet = build_ack(42);

        assert_eq!(packet.len(), 4);
        assert_eq!(
            u16::from_be_bytes([packet[0], packet[1]]),
            Opcode::Acknowledgment.as_u16()
        );
        assert_eq!(u16::from_be_bytes([packet[2], packet[3]]), 42);
    }

    #[test]
    fn test_build_error() {
        let packet = build_error(ErrorCode::FileNotFound, "File not found");

        assert_eq!(u16::from_be_bytes([packet[0], packet[1]]), Opcode::Error.as_u16());
        assert_eq!(
            u16::from_be_bytes([packet[2], packet[3]]),
            ErrorCode::FileNotFound.as_u16()
        );
        assert_eq!(&packet[4..packet.len() - 1], b"File not found");
        assert_eq!(packet[packet.len() - 1], 0);
    }

    #[test]
    fn test_build_error_truncates_long_message() {
        let long = "x".repeat(600);
        let packet = build_error(ErrorCode::NotDefined, &long);
        assert_eq!(packet.len(), BLOCK_SIZE);
        assert_eq!(packet[packet.len() - 1], 0);
    }

    #[test]
    fn test_get_opcode() {
        assert_eq!(get_opcode(&build_ack(5)), Some(Opcode::Acknowledgment));
        assert_eq!(get_opcode(&build_data(1, b"x")), Some(Opcode::Data));
        assert_eq!(get_opcode(&[0x00, 0x63, 0x00, 0x00]), None);
        assert_eq!(get_opcode(&[]), None);
        assert_eq!(get_opcode(&[1]), None);
    }
}
