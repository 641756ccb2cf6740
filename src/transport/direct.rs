//! Direct TCP dialer
//!
//! Used when no proxy is configured.

use super::{Dial, DialContext, Network, SocketOpts};
use crate::error::DialError;
use crate::helper::{with_deadline, DEFAULT_DIAL_TIMEOUT_SECS};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};

/// Dialer opening plain TCP connections to the destination
#[derive(Debug, Clone)]
pub struct DirectDialer {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Fallback deadline when the context has none
    timeout: Duration,
}

impl DirectDialer {
    /// Create a new direct dialer with default options
    pub fn with_defaults() -> Self {
        DirectDialer {
            socket_opts: SocketOpts::default(),
            timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set fallback timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Dial for DirectDialer {
    async fn dial(
        &self,
        ctx: &DialContext,
        network: &str,
        addr: &str,
    ) -> Result<TcpStream, DialError> {
        let network = Network::parse(network)?;
        let deadline = ctx.deadline_or(self.timeout);

        let stream = with_deadline(Some(deadline), connect_any(network, addr))
            .await
            .map_err(|source| DialError::Direct {
                addr: addr.to_string(),
                source,
            })?;

        self.socket_opts.hint(&stream);
        tracing::debug!("TCP connection established to {}", addr);

        Ok(stream)
    }
}

/// Try each resolved address of the requested family in turn
async fn connect_any(network: Network, addr: &str) -> io::Result<TcpStream> {
    let mut last_err = None;

    for candidate in lookup_host(addr).await?.filter(|a| network.accepts(a)) {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {} address found for {}", network, addr),
        )
    }))
}
