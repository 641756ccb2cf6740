//! Transport module for Socksdial
//!
//! This module provides the dial abstraction handed to higher layers and its
//! two implementations: plain TCP and TCP tunnelled through a SOCKS5 proxy.

mod direct;
mod socks5;

pub use direct::DirectDialer;
pub use socks5::Socks5Dialer;

use crate::config::DialerConfig;
use crate::error::{ConfigError, DialError};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Socket options for configuring connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(crate::helper::DEFAULT_KEEPALIVE_SECS),
            keepalive_interval: Some(crate::helper::DEFAULT_KEEPALIVE_INTERVAL_SECS),
        }
    }
}

impl SocketOpts {
    /// Create socket options from dialer config
    pub fn from_dialer_config(config: &DialerConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }

    /// Apply socket options, logging instead of failing
    pub fn hint(&self, stream: &TcpStream) {
        if let Err(e) = self.apply(stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }
    }
}

/// Deadline carried into a dial
///
/// Without a deadline the dialer falls back to its own timeout. Dropping the
/// dial future cancels it at any point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialContext {
    deadline: Option<Instant>,
}

impl DialContext {
    /// Context with no deadline
    pub fn background() -> Self {
        DialContext::default()
    }

    /// Context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        DialContext {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Context expiring at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        DialContext {
            deadline: Some(deadline),
        }
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Deadline, or `fallback` from now when none is set
    pub fn deadline_or(&self, fallback: Duration) -> Instant {
        self.deadline
            .unwrap_or_else(|| Instant::now() + fallback)
    }
}

/// Network flavours accepted by the dialers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Any address family
    Tcp,
    /// IPv4 only
    Tcp4,
    /// IPv6 only
    Tcp6,
}

impl Network {
    /// Parse a network name; anything other than tcp, tcp4 or tcp6 is rejected
    pub fn parse(network: &str) -> Result<Self, DialError> {
        match network {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(DialError::UnsupportedNetwork(other.to_string())),
        }
    }

    /// Whether `addr` belongs to this network
    pub fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Tcp4 => write!(f, "tcp4"),
            Network::Tcp6 => write!(f, "tcp6"),
        }
    }
}

/// Connection-establishing hook for higher layers
///
/// Implementations must be safe to share across concurrent dials.
#[async_trait]
pub trait Dial: Debug + Send + Sync {
    /// Open a stream to `addr` (`host:port`) over `network`
    async fn dial(
        &self,
        ctx: &DialContext,
        network: &str,
        addr: &str,
    ) -> Result<TcpStream, DialError>;
}

/// Create a dialer based on configuration
///
/// An empty proxy string yields a [`DirectDialer`].
pub fn create_dialer(config: &DialerConfig) -> Result<Arc<dyn Dial>, ConfigError> {
    let socket_opts = SocketOpts::from_dialer_config(config);

    match config.proxy_endpoint()? {
        None => Ok(Arc::new(
            DirectDialer::with_defaults()
                .with_socket_opts(socket_opts)
                .with_timeout(config.timeout()),
        )),
        Some(endpoint) => Ok(Arc::new(
            Socks5Dialer::new(endpoint)
                .with_socket_opts(socket_opts)
                .with_timeout(config.timeout()),
        )),
    }
}

/// Holder of the current dialer, switchable between direct and proxied
///
/// Stands in the transport slot of an HTTP client: every outbound
/// connection goes through [`Connector::dial`].
#[derive(Debug, Clone)]
pub struct Connector {
    config: DialerConfig,
    dialer: Arc<dyn Dial>,
}

impl Default for Connector {
    fn default() -> Self {
        Connector {
            config: DialerConfig::default(),
            dialer: Arc::new(DirectDialer::with_defaults()),
        }
    }
}

impl Connector {
    /// Create a connector from configuration
    pub fn new(config: DialerConfig) -> Result<Self, ConfigError> {
        let dialer = create_dialer(&config)?;
        Ok(Connector { config, dialer })
    }

    /// Route connections through `proxy`; an empty string restores direct dialing
    ///
    /// On error the previous dialer stays in place.
    pub fn set_socks5_proxy(&mut self, proxy: &str) -> Result<(), ConfigError> {
        let config = DialerConfig {
            proxy: proxy.to_string(),
            ..self.config.clone()
        };
        self.dialer = create_dialer(&config)?;
        self.config = config;
        Ok(())
    }

    /// Whether connections go through a proxy
    pub fn is_proxied(&self) -> bool {
        !self.config.proxy.is_empty()
    }

    /// Current dialer, for handing to another transport
    pub fn dialer(&self) -> Arc<dyn Dial> {
        Arc::clone(&self.dialer)
    }

    /// Open a connection with the current dialer
    pub async fn dial(
        &self,
        ctx: &DialContext,
        network: &str,
        addr: &str,
    ) -> Result<TcpStream, DialError> {
        self.dialer.dial(ctx, network, addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_opts_default() {
        let opts = SocketOpts::default();
        assert!(opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(30));
        assert_eq!(opts.keepalive_interval, Some(10));
    }

    #[test]
    fn test_socket_opts_from_dialer_config() {
        let config = DialerConfig {
            nodelay: false,
            keepalive_secs: 60,
            keepalive_interval: 15,
            ..Default::default()
        };
        let opts = SocketOpts::from_dialer_config(&config);
        assert!(!opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(60));
        assert_eq!(opts.keepalive_interval, Some(15));
    }

    #[test]
    fn test_network_parse() {
        assert_eq!(Network::parse("tcp").unwrap(), Network::Tcp);
        assert_eq!(Network::parse("tcp4").unwrap(), Network::Tcp4);
        assert_eq!(Network::parse("tcp6").unwrap(), Network::Tcp6);

        for bad in ["udp", "unix", "TCP", ""] {
            assert!(matches!(
                Network::parse(bad),
                Err(DialError::UnsupportedNetwork(_))
            ));
        }
    }

    #[test]
    fn test_network_accepts() {
        let v4: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let v6: SocketAddr = "[::1]:80".parse().unwrap();

        assert!(Network::Tcp.accepts(&v4) && Network::Tcp.accepts(&v6));
        assert!(Network::Tcp4.accepts(&v4) && !Network::Tcp4.accepts(&v6));
        assert!(!Network::Tcp6.accepts(&v4) && Network::Tcp6.accepts(&v6));
    }

    #[tokio::test]
    async fn test_dial_context_deadline() {
        assert!(DialContext::background().deadline().is_none());

        let ctx = DialContext::with_timeout(Duration::from_secs(5));
        let deadline = ctx.deadline().unwrap();
        assert!(deadline > Instant::now());
        assert_eq!(ctx.deadline_or(Duration::from_secs(60)), deadline);

        let fallback = DialContext::background().deadline_or(Duration::from_secs(30));
        assert!(fallback > Instant::now() + Duration::from_secs(29));
    }

    #[test]
    fn test_connector_switching() {
        let mut connector = Connector::default();
        assert!(!connector.is_proxied());

        connector.set_socks5_proxy("user:pass@10.0.0.1:1080").unwrap();
        assert!(connector.is_proxied());

        connector.set_socks5_proxy("").unwrap();
        assert!(!connector.is_proxied());
    }

    #[test]
    fn test_connector_keeps_dialer_on_error() {
        let mut connector = Connector::default();
        connector.set_socks5_proxy("10.0.0.1:1080").unwrap();

        assert!(connector.set_socks5_proxy("ftp://10.0.0.1:21").is_err());
        assert!(connector.is_proxied());
        assert!(format!("{:?}", connector.dialer()).contains("Socks5Dialer"));
    }

    #[test]
    fn test_create_dialer_direct() {
        let dialer = create_dialer(&DialerConfig::default()).unwrap();
        assert!(format!("{:?}", dialer).contains("DirectDialer"));
    }
}
