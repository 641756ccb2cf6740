//! SOCKS5 client handshake
//!
//! Drives greeting, optional username/password sub-negotiation (RFC 1929) and
//! CONNECT over a stream that is already connected to the proxy. Once the
//! handshake reaches [`HandshakeState::Established`] the stream is a plain
//! tunnel to the destination.

use super::addr::{read_address, DestinationAddr};
use super::consts::*;
use super::reply::ReplyCode;
use crate::config::ProxyEndpointConfig;
use crate::error::{AddrError, DialError, Phase};
use crate::helper::with_deadline;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Position in the client handshake
///
/// Each variant carries what the next transition needs, so a step can only
/// run once the step before it has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet
    Init,
    /// Method list sent
    GreetingSent,
    /// Proxy picked a method
    MethodChosen(u8),
    /// Username/password accepted
    AuthExchanged,
    /// Proxy picked a method without sub-negotiation
    AuthSkipped,
    /// CONNECT request sent
    ConnectSent,
    /// Successful reply read in full
    ReplyParsed(SocksReply),
    /// Tunnel ready; carries the bound address reported by the proxy
    Established(DestinationAddr),
}

/// CONNECT reply as read from the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksReply {
    /// REP field
    pub status: ReplyCode,
    /// BND.ADDR and BND.PORT
    pub bound: DestinationAddr,
}

/// One client handshake towards a fixed destination
///
/// Holds no connection state of its own; the stream is lent to [`run`](Self::run).
#[derive(Debug)]
pub struct Handshake<'a> {
    proxy: &'a ProxyEndpointConfig,
    request: Vec<u8>,
    deadline: Option<Instant>,
}

impl<'a> Handshake<'a> {
    /// Prepare a handshake towards `target`
    ///
    /// The CONNECT request is encoded here, so a bad destination is rejected
    /// before any byte is written.
    pub fn new(proxy: &'a ProxyEndpointConfig, target: &DestinationAddr) -> Result<Self, DialError> {
        if target.port() == 0 {
            return Err(DialError::InvalidDestination {
                addr: target.to_string(),
                reason: "port number out of range: 0".to_string(),
            });
        }

        let mut request = Vec::with_capacity(3 + target.encoded_len());
        request.extend_from_slice(&[SOCKS5_VERSION, SOCKS5_CMD_TCP_CONNECT, SOCKS5_RESERVED]);
        target.encode_into(&mut request).map_err(|_| {
            let host = match target {
                DestinationAddr::Domain(domain, _) => domain.clone(),
                other => other.to_string(),
            };
            DialError::AddressTooLong(host)
        })?;

        Ok(Handshake {
            proxy,
            request,
            deadline: None,
        })
    }

    /// Bound every read and write by `deadline`
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run every step in order on `stream` and return the bound address
    pub async fn run<S>(&self, stream: &mut S) -> Result<DestinationAddr, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = HandshakeState::Init;
        loop {
            state = match self.advance(stream, state).await? {
                HandshakeState::Established(bound) => {
                    debug!(proxy = %self.proxy.address(), %bound, "SOCKS5 tunnel established");
                    return Ok(bound);
                }
                next => {
                    trace!(proxy = %self.proxy.address(), state = ?next, "SOCKS5 handshake step");
                    next
                }
            };
        }
    }

    async fn advance<S>(&self, stream: &mut S, state: HandshakeState) -> Result<HandshakeState, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match state {
            HandshakeState::Init => self.send_greeting(stream).await,
            HandshakeState::GreetingSent => self.read_method(stream).await,
            HandshakeState::MethodChosen(SOCKS5_AUTH_METHOD_PASSWORD) => {
                self.authenticate(stream).await
            }
            HandshakeState::MethodChosen(_) => Ok(HandshakeState::AuthSkipped),
            HandshakeState::AuthExchanged | HandshakeState::AuthSkipped => {
                self.write(stream, Phase::WriteConnect, &self.request).await?;
                Ok(HandshakeState::ConnectSent)
            }
            HandshakeState::ConnectSent => self.read_reply(stream).await,
            HandshakeState::ReplyParsed(reply) => Ok(HandshakeState::Established(reply.bound)),
            established @ HandshakeState::Established(_) => Ok(established),
        }
    }

    /// ```text
    /// +----+----------+----------+
    /// |VER | NMETHODS | METHODS  |
    /// +----+----------+----------+
    /// | 1  |    1     | 1 to 255 |
    /// +----+----------+----------+
    /// ```
    async fn send_greeting<S>(&self, stream: &mut S) -> Result<HandshakeState, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let greeting: &[u8] = if self.proxy.offers_password_auth() {
            &[
                SOCKS5_VERSION,
                2,
                SOCKS5_AUTH_METHOD_NONE,
                SOCKS5_AUTH_METHOD_PASSWORD,
            ]
        } else {
            &[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
        };

        self.write(stream, Phase::WriteGreeting, greeting).await?;
        Ok(HandshakeState::GreetingSent)
    }

    async fn read_method<S>(&self, stream: &mut S) -> Result<HandshakeState, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = [0u8; 2];
        self.read(stream, Phase::ReadGreeting, &mut buf).await?;

        if buf[0] != SOCKS5_VERSION {
            return Err(DialError::UnexpectedVersion {
                proxy: self.proxy.address().to_string(),
                version: buf[0],
            });
        }
        if buf[1] == SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE {
            return Err(DialError::AuthenticationRequired(
                self.proxy.address().to_string(),
            ));
        }

        Ok(HandshakeState::MethodChosen(buf[1]))
    }

    /// ```text
    /// +----+------+----------+------+----------+
    /// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    /// +----+------+----------+------+----------+
    /// | 1  |  1   | 1 to 255 |  1   | 0 to 255 |
    /// +----+------+----------+------+----------+
    /// ```
    async fn authenticate<S>(&self, stream: &mut S) -> Result<HandshakeState, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.proxy.offers_password_auth() {
            return Err(DialError::CredentialsRequired(
                self.proxy.address().to_string(),
            ));
        }

        let username = self.proxy.username().as_bytes();
        let password = self.proxy.password().as_bytes();
        let (ulen, plen) = match (u8::try_from(username.len()), u8::try_from(password.len())) {
            (Ok(ulen), Ok(plen)) => (ulen, plen),
            _ => {
                return Err(DialError::CredentialsRequired(
                    self.proxy.address().to_string(),
                ));
            }
        };

        let mut request = Vec::with_capacity(3 + username.len() + password.len());
        request.push(SOCKS5_AUTH_VERSION);
        request.push(ulen);
        request.extend_from_slice(username);
        request.push(plen);
        request.extend_from_slice(password);
        self.write(stream, Phase::WriteAuth, &request).await?;

        // The version byte of the reply is not checked.
        let mut buf = [0u8; 2];
        self.read(stream, Phase::ReadAuth, &mut buf).await?;
        if buf[1] != SOCKS5_AUTH_SUCCESS {
            return Err(DialError::CredentialsRejected(
                self.proxy.address().to_string(),
            ));
        }

        Ok(HandshakeState::AuthExchanged)
    }

    /// ```text
    /// +----+-----+-------+------+----------+----------+
    /// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    /// +----+-----+-------+------+----------+----------+
    /// | 1  |  1  | X'00' |  1   | Variable |    2     |
    /// +----+-----+-------+------+----------+----------+
    /// ```
    ///
    /// The whole reply, bound address included, is read before REP is judged.
    /// VER is not checked.
    async fn read_reply<S>(&self, stream: &mut S) -> Result<HandshakeState, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut header = [0u8; 4];
        self.read(stream, Phase::ReadConnectReply, &mut header).await?;

        let status = ReplyCode::from(header[1]);
        let bound = self.read_bound_address(stream, header[3]).await;

        if !status.is_success() {
            return Err(DialError::ConnectFailed {
                proxy: self.proxy.address().to_string(),
                reply: status,
            });
        }

        Ok(HandshakeState::ReplyParsed(SocksReply {
            status,
            bound: bound?,
        }))
    }

    async fn read_bound_address<S>(
        &self,
        stream: &mut S,
        addr_type: u8,
    ) -> Result<DestinationAddr, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = with_deadline(self.deadline, read_address(stream, addr_type)).await;

        result.map_err(|e| {
            let proxy = self.proxy.address();
            match e {
                AddrError::UnknownAddressType(atype) => DialError::UnknownAddressType {
                    proxy: proxy.to_string(),
                    atype,
                },
                AddrError::Io(source) => DialError::io(Phase::ReadBoundAddress, proxy, source),
                other => DialError::io(
                    Phase::ReadBoundAddress,
                    proxy,
                    io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
                ),
            }
        })
    }

    async fn write<S>(&self, stream: &mut S, phase: Phase, buf: &[u8]) -> Result<(), DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = with_deadline(self.deadline, async {
            stream.write_all(buf).await?;
            stream.flush().await
        })
        .await;

        result.map_err(|e| DialError::io(phase, self.proxy.address(), e))
    }

    async fn read<S>(&self, stream: &mut S, phase: Phase, buf: &mut [u8]) -> Result<(), DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = with_deadline(self.deadline, async {
            stream.read_exact(buf).await.map(|_| ())
        })
        .await;

        result.map_err(|e| DialError::io(phase, self.proxy.address(), e))
    }
}

/// Perform the client handshake for `target` on `stream`
///
/// On error the stream is in an undefined protocol position and should be
/// dropped by the caller.
pub async fn connect<S>(
    stream: &mut S,
    proxy: &ProxyEndpointConfig,
    target: &DestinationAddr,
    deadline: Option<Instant>,
) -> Result<DestinationAddr, DialError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Handshake::new(proxy, target)?
        .with_deadline(deadline)
        .run(stream)
        .await
}
