//! SOCKS5 address codec
//!
//! Encodes a destination into the ATYP/ADDR/PORT wire form and decodes the
//! bound address that trails a CONNECT reply.

use super::consts::*;
use crate::error::{AddrError, DialError};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Destination (or bound) address in a SOCKS5 message
///
/// Can be an IP address (v4 or v6) or a domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl DestinationAddr {
    /// Classify `host` as IPv4, IPv6 or domain name, in that order
    ///
    /// IPv4-mapped IPv6 literals (`::ffff:a.b.c.d`) are carried as IPv4.
    pub fn new(host: &str, port: u16) -> Result<Self, AddrError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(DestinationAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port)));
        }
        if let Ok(ip) = host.parse::<Ipv6Addr>() {
            let ip = match ip.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => IpAddr::V6(ip),
            };
            return Ok(DestinationAddr::Ip(SocketAddr::new(ip, port)));
        }
        if host.len() > MAX_DOMAIN_LEN {
            return Err(AddrError::DomainTooLong(host.len()));
        }
        Ok(DestinationAddr::Domain(host.to_string(), port))
    }

    /// Parse a caller-supplied `host:port` destination
    ///
    /// Bracketed IPv6 hosts (`[::1]:443`) are accepted. The port must be
    /// within 1..=65535.
    pub fn from_host_port(addr: &str) -> Result<Self, DialError> {
        let invalid = |reason: &str| DialError::InvalidDestination {
            addr: addr.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = split_host_port(addr).map_err(invalid)?;
        let port: u32 = port
            .parse()
            .map_err(|_| invalid(&format!("failed to parse port number: {}", port)))?;
        if !(1..=u16::MAX as u32).contains(&port) {
            return Err(invalid(&format!("port number out of range: {}", port)));
        }

        DestinationAddr::new(host, port as u16).map_err(|e| match e {
            AddrError::DomainTooLong(_) => DialError::AddressTooLong(host.to_string()),
            other => invalid(&other.to_string()),
        })
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            DestinationAddr::Ip(addr) => addr.port(),
            DestinationAddr::Domain(_, port) => *port,
        }
    }

    /// Get the address type byte for SOCKS5 protocol
    pub fn addr_type(&self) -> u8 {
        match self {
            DestinationAddr::Ip(SocketAddr::V4(_)) => SOCKS5_ADDR_TYPE_IPV4,
            DestinationAddr::Ip(SocketAddr::V6(_)) => SOCKS5_ADDR_TYPE_IPV6,
            DestinationAddr::Domain(_, _) => SOCKS5_ADDR_TYPE_DOMAIN,
        }
    }

    /// Append ATYP, address and big-endian port to `buf`
    ///
    /// Nothing is appended when the domain is too long.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), AddrError> {
        match self {
            DestinationAddr::Ip(SocketAddr::V4(addr)) => {
                buf.push(SOCKS5_ADDR_TYPE_IPV4);
                buf.extend_from_slice(&addr.ip().octets());
            }
            DestinationAddr::Ip(SocketAddr::V6(addr)) => {
                buf.push(SOCKS5_ADDR_TYPE_IPV6);
                buf.extend_from_slice(&addr.ip().octets());
            }
            DestinationAddr::Domain(domain, _) => {
                if domain.len() > MAX_DOMAIN_LEN {
                    return Err(AddrError::DomainTooLong(domain.len()));
                }
                buf.push(SOCKS5_ADDR_TYPE_DOMAIN);
                buf.push(domain.len() as u8);
                buf.extend_from_slice(domain.as_bytes());
            }
        }
        buf.extend_from_slice(&self.port().to_be_bytes());
        Ok(())
    }

    /// Serialize the address to bytes for SOCKS5 protocol
    pub fn to_bytes(&self) -> Result<Vec<u8>, AddrError> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Number of bytes [`encode_into`](Self::encode_into) writes
    pub fn encoded_len(&self) -> usize {
        let addr_len = match self {
            DestinationAddr::Ip(SocketAddr::V4(_)) => 4,
            DestinationAddr::Ip(SocketAddr::V6(_)) => 16,
            DestinationAddr::Domain(domain, _) => 1 + domain.len(),
        };
        1 + addr_len + 2
    }
}

impl fmt::Display for DestinationAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationAddr::Ip(addr) => write!(f, "{}", addr),
            DestinationAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for DestinationAddr {
    fn from(addr: SocketAddr) -> Self {
        DestinationAddr::Ip(addr)
    }
}

/// Read ATYP, address and port from `reader`
pub async fn decode_bound_address<R>(reader: &mut R) -> Result<DestinationAddr, AddrError>
where
    R: AsyncRead + Unpin,
{
    let mut atype = [0u8; 1];
    reader.read_exact(&mut atype).await?;
    read_address(reader, atype[0]).await
}

/// Read the address and port for an already consumed ATYP byte
pub async fn read_address<R>(reader: &mut R, addr_type: u8) -> Result<DestinationAddr, AddrError>
where
    R: AsyncRead + Unpin,
{
    let addr = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut octets = [0u8; 4];
            reader.read_exact(&mut octets).await?;
            DestinationAddr::Ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), 0))
        }
        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut octets = [0u8; 16];
            reader.read_exact(&mut octets).await?;
            DestinationAddr::Ip(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), 0))
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len = [0u8; 1];
            reader.read_exact(&mut len).await?;
            let mut domain = vec![0u8; len[0] as usize];
            reader.read_exact(&mut domain).await?;
            // Only used for logging, so invalid UTF-8 is tolerated.
            DestinationAddr::Domain(String::from_utf8_lossy(&domain).into_owned(), 0)
        }
        other => return Err(AddrError::UnknownAddressType(other)),
    };

    let mut port = [0u8; 2];
    reader.read_exact(&mut port).await?;
    let port = u16::from_be_bytes(port);

    Ok(match addr {
        DestinationAddr::Ip(ip) => DestinationAddr::Ip(SocketAddr::new(ip.ip(), port)),
        DestinationAddr::Domain(domain, _) => DestinationAddr::Domain(domain, port),
    })
}

fn split_host_port(addr: &str) -> Result<(&str, &str), &'static str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or("missing ']' in address")?;
        let port = tail.strip_prefix(':').ok_or("missing port in address")?;
        return Ok((host, port));
    }

    let (host, port) = addr.rsplit_once(':').ok_or("missing port in address")?;
    if host.contains(':') {
        return Err("too many colons in address");
    }
    Ok((host, port))
}
