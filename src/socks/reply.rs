//! SOCKS5 reply status mapping
//!
//! Maps the REP byte of a CONNECT reply to a failure reason.

use std::fmt;
use std::io;

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded,
    /// General SOCKS server failure
    GeneralFailure,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed,
    /// Network unreachable
    NetworkUnreachable,
    /// Host unreachable
    HostUnreachable,
    /// Connection refused
    ConnectionRefused,
    /// TTL expired
    TtlExpired,
    /// Command not supported
    CommandNotSupported,
    /// Address type not supported
    AddressTypeNotSupported,
    /// Any value outside the RFC 1928 table
    Unknown(u8),
}

impl ReplyCode {
    /// Whether this status means the tunnel is open
    pub fn is_success(self) -> bool {
        self == ReplyCode::Succeeded
    }

    /// Human-readable reason; empty for success
    pub fn reason(self) -> &'static str {
        match self {
            ReplyCode::Succeeded => "",
            ReplyCode::GeneralFailure => "general failure",
            ReplyCode::ConnectionNotAllowed => "connection forbidden",
            ReplyCode::NetworkUnreachable => "network unreachable",
            ReplyCode::HostUnreachable => "host unreachable",
            ReplyCode::ConnectionRefused => "connection refused",
            ReplyCode::TtlExpired => "TTL expired",
            ReplyCode::CommandNotSupported => "command not supported",
            ReplyCode::AddressTypeNotSupported => "address type not supported",
            ReplyCode::Unknown(_) => "unknown failure",
        }
    }

    /// Closest `io::ErrorKind` for callers that only speak `io::Error`
    pub fn io_error_kind(self) -> io::ErrorKind {
        match self {
            ReplyCode::ConnectionRefused => io::ErrorKind::ConnectionRefused,
            ReplyCode::ConnectionNotAllowed => io::ErrorKind::PermissionDenied,
            ReplyCode::TtlExpired => io::ErrorKind::TimedOut,
            ReplyCode::CommandNotSupported | ReplyCode::AddressTypeNotSupported => {
                io::ErrorKind::Unsupported
            }
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<u8> for ReplyCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ReplyCode::Succeeded,
            0x01 => ReplyCode::GeneralFailure,
            0x02 => ReplyCode::ConnectionNotAllowed,
            0x03 => ReplyCode::NetworkUnreachable,
            0x04 => ReplyCode::HostUnreachable,
            0x05 => ReplyCode::ConnectionRefused,
            0x06 => ReplyCode::TtlExpired,
            0x07 => ReplyCode::CommandNotSupported,
            0x08 => ReplyCode::AddressTypeNotSupported,
            other => ReplyCode::Unknown(other),
        }
    }
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        match code {
            ReplyCode::Succeeded => 0x00,
            ReplyCode::GeneralFailure => 0x01,
            ReplyCode::ConnectionNotAllowed => 0x02,
            ReplyCode::NetworkUnreachable => 0x03,
            ReplyCode::HostUnreachable => 0x04,
            ReplyCode::ConnectionRefused => 0x05,
            ReplyCode::TtlExpired => 0x06,
            ReplyCode::CommandNotSupported => 0x07,
            ReplyCode::AddressTypeNotSupported => 0x08,
            ReplyCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyCode::Succeeded => f.write_str("succeeded"),
            ReplyCode::Unknown(code) => write!(f, "unknown failure (reply code {})", code),
            other => f.write_str(other.reason()),
        }
    }
}
