//! SOCKS5 dialer
//!
//! Opens a TCP connection to the proxy, runs the client handshake under the
//! dial deadline and hands back the tunnelled stream.

use super::{Dial, DialContext, Network, SocketOpts};
use crate::config::ProxyEndpointConfig;
use crate::error::{DialError, Phase};
use crate::helper::{with_deadline, DEFAULT_DIAL_TIMEOUT_SECS};
use crate::socks::{DestinationAddr, Handshake};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Dialer tunnelling every connection through one SOCKS5 proxy
///
/// Holds only immutable configuration, so one instance serves any number of
/// concurrent dials.
#[derive(Debug, Clone)]
pub struct Socks5Dialer {
    proxy: ProxyEndpointConfig,
    socket_opts: SocketOpts,
    timeout: Duration,
}

impl Socks5Dialer {
    /// Create a dialer for `proxy` with default options
    pub fn new(proxy: ProxyEndpointConfig) -> Self {
        Socks5Dialer {
            proxy,
            socket_opts: SocketOpts::default(),
            timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
        }
    }

    /// Set socket options for the proxy connection
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set the deadline used when the context carries none
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Proxy this dialer connects through
    pub fn proxy(&self) -> &ProxyEndpointConfig {
        &self.proxy
    }

    /// Open a tunnel to an already parsed destination
    ///
    /// The deadline covers the TCP connect and every handshake read and
    /// write. The returned stream carries no deadline.
    pub async fn dial_addr(
        &self,
        ctx: &DialContext,
        target: &DestinationAddr,
    ) -> Result<TcpStream, DialError> {
        let deadline = ctx.deadline_or(self.timeout);
        let handshake = Handshake::new(&self.proxy, target)?.with_deadline(Some(deadline));
        let proxy_addr = self.proxy.address();

        let mut stream = with_deadline(Some(deadline), TcpStream::connect(proxy_addr))
            .await
            .map_err(|e| DialError::io(Phase::Connect, proxy_addr, e))?;
        self.socket_opts.hint(&stream);
        debug!(proxy = %proxy_addr, %target, "connected to SOCKS5 proxy");

        match handshake.run(&mut stream).await {
            Ok(_) => Ok(stream),
            Err(e) => {
                debug!(proxy = %proxy_addr, %target, error = %e, "SOCKS5 handshake failed");
                // Closes the socket before the error leaves the dialer.
                drop(stream);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Dial for Socks5Dialer {
    async fn dial(
        &self,
        ctx: &DialContext,
        network: &str,
        addr: &str,
    ) -> Result<TcpStream, DialError> {
        // The flavour is only validated; the proxy itself is reached over plain tcp.
        Network::parse(network)?;
        let target = DestinationAddr::from_host_port(addr)?;
        self.dial_addr(ctx, &target).await
    }
}
