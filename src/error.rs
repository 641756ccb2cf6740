//! Error types for Socksdial
//!
//! This module defines all custom error types used throughout the library.

use crate::socks::ReplyCode;
use std::fmt;
use std::io;
use thiserror::Error;

/// Errors raised while parsing a proxy configuration string
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The string could not be parsed as a URI
    #[error("invalid proxy URL {url:?}: {source}")]
    InvalidUrl {
        /// The normalized string handed to the parser
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// Scheme other than `socks5`
    #[error("unsupported proxy scheme {0:?}")]
    UnsupportedScheme(String),

    /// No host:port given
    #[error("proxy address is empty")]
    EmptyAddress,

    /// host given without a port separator
    #[error("proxy address {0:?} must include port")]
    MissingPort(String),

    /// Percent-escaped user info that is not valid UTF-8
    #[error("proxy {0} is not valid UTF-8 after percent-decoding")]
    InvalidCredentials(&'static str),
}

/// Errors raised by the SOCKS5 address codec
#[derive(Error, Debug)]
pub enum AddrError {
    /// Address type tag outside IPv4 / domain / IPv6
    #[error("unknown address type {0}")]
    UnknownAddressType(u8),

    /// Domain name longer than a length byte can describe
    #[error("domain name too long: {0} bytes")]
    DomainTooLong(usize),

    /// Short read or closed stream
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Step of a dial during which an I/O error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Opening the TCP connection
    Connect,
    /// Sending the method list
    WriteGreeting,
    /// Reading the chosen method
    ReadGreeting,
    /// Sending username/password
    WriteAuth,
    /// Reading the sub-negotiation status
    ReadAuth,
    /// Sending the CONNECT request
    WriteConnect,
    /// Reading the CONNECT reply header
    ReadConnectReply,
    /// Reading the bound address trailing the reply header
    ReadBoundAddress,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Connect => "connect to",
            Phase::WriteGreeting => "write greeting to",
            Phase::ReadGreeting => "read greeting from",
            Phase::WriteAuth => "write authentication request to",
            Phase::ReadAuth => "read authentication reply from",
            Phase::WriteConnect => "write connect request to",
            Phase::ReadConnectReply => "read connect reply from",
            Phase::ReadBoundAddress => "read bound address from",
        };
        f.write_str(s)
    }
}

/// Broad category of a [`DialError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any network activity
    Config,
    /// Connect, read, write or deadline failure
    Io,
    /// The proxy violated or refused the negotiation
    Protocol,
    /// The proxy could not reach the destination
    Connect,
}

/// Everything a dial can fail with
#[derive(Error, Debug)]
pub enum DialError {
    /// Proxy configuration could not be parsed
    #[error("proxy configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network type other than tcp, tcp4 or tcp6
    #[error("proxy: no support for SOCKS5 proxy connections of type {0}")]
    UnsupportedNetwork(String),

    /// Destination host:port could not be used
    #[error("proxy: invalid destination {addr:?}: {reason}")]
    InvalidDestination {
        /// Destination as given by the caller
        addr: String,
        /// What is wrong with it
        reason: String,
    },

    /// Destination domain does not fit the length byte
    #[error("proxy: destination host name too long: {0}")]
    AddressTooLong(String),

    /// I/O failure while talking to the proxy
    #[error("proxy: failed to {phase} SOCKS5 proxy at {proxy}: {source}")]
    Io {
        /// Step that failed
        phase: Phase,
        /// Proxy address
        proxy: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Proxy answered with a version byte other than 5
    #[error("proxy: SOCKS5 proxy at {proxy} has unexpected version {version}")]
    UnexpectedVersion {
        /// Proxy address
        proxy: String,
        /// Version byte received
        version: u8,
    },

    /// Proxy accepted none of the offered methods
    #[error("proxy: SOCKS5 proxy at {0} requires authentication")]
    AuthenticationRequired(String),

    /// Proxy chose username/password but no usable credentials are configured
    #[error("proxy: SOCKS5 proxy at {0} requires username/password")]
    CredentialsRequired(String),

    /// Proxy refused the configured username/password
    #[error("proxy: SOCKS5 proxy at {0} rejected username/password")]
    CredentialsRejected(String),

    /// Reply carried an address type tag we cannot parse
    #[error("proxy: got unknown address type {atype} from SOCKS5 proxy at {proxy}")]
    UnknownAddressType {
        /// Proxy address
        proxy: String,
        /// Tag received
        atype: u8,
    },

    /// Proxy reported a non-zero CONNECT status
    #[error("proxy: SOCKS5 proxy at {proxy} failed to connect: {reply}")]
    ConnectFailed {
        /// Proxy address
        proxy: String,
        /// Status returned
        reply: ReplyCode,
    },

    /// Direct (unproxied) connection failure
    #[error("dial {addr}: {source}")]
    Direct {
        /// Destination address
        addr: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl DialError {
    /// Wrap an I/O error with the phase and proxy it belongs to
    pub fn io(phase: Phase, proxy: &str, source: io::Error) -> Self {
        DialError::Io {
            phase,
            proxy: proxy.to_string(),
            source,
        }
    }

    /// Category of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            DialError::Config(_)
            | DialError::UnsupportedNetwork(_)
            | DialError::InvalidDestination { .. }
            | DialError::AddressTooLong(_) => ErrorClass::Config,
            DialError::Io { .. } | DialError::Direct { .. } => ErrorClass::Io,
            DialError::UnexpectedVersion { .. }
            | DialError::AuthenticationRequired(_)
            | DialError::CredentialsRequired(_)
            | DialError::CredentialsRejected(_)
            | DialError::UnknownAddressType { .. } => ErrorClass::Protocol,
            DialError::ConnectFailed { .. } => ErrorClass::Connect,
        }
    }

    /// Whether the dial ran past its deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            DialError::Io { source, .. } | DialError::Direct { source, .. } => {
                source.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }
}

impl From<DialError> for io::Error {
    fn from(err: DialError) -> Self {
        let kind = match &err {
            DialError::Io { source, .. } | DialError::Direct { source, .. } => source.kind(),
            DialError::ConnectFailed { reply, .. } => reply.io_error_kind(),
            DialError::CredentialsRejected(_)
            | DialError::CredentialsRequired(_)
            | DialError::AuthenticationRequired(_) => io::ErrorKind::PermissionDenied,
            DialError::Config(_)
            | DialError::UnsupportedNetwork(_)
            | DialError::InvalidDestination { .. }
            | DialError::AddressTooLong(_) => io::ErrorKind::InvalidInput,
            DialError::UnexpectedVersion { .. } | DialError::UnknownAddressType { .. } => {
                io::ErrorKind::InvalidData
            }
        };
        io::Error::new(kind, err)
    }
}
