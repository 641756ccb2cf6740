//! # Socksdial - SOCKS5 Client Dialer
//!
//! Socksdial opens outbound TCP connections either directly or through a
//! SOCKS5 proxy (RFC 1928), optionally authenticating with username and
//! password (RFC 1929). The result is a plain `TcpStream` that higher layers,
//! such as an HTTP client transport, use as an ordinary byte stream to the
//! destination.
//!
//! ## Features
//!
//! - **CONNECT only**: one fresh proxy handshake per dial, no pooling
//! - **Deadline-bound**: connect and every handshake read/write share one deadline
//! - **Typed errors**: proxy unreachable, credentials rejected and destination
//!   unreachable are distinct error variants
//! - **Switchable**: an empty proxy string restores direct dialing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksdial::transport::{Connector, DialContext};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut connector = Connector::default();
//!     connector.set_socks5_proxy("user:pass@127.0.0.1:1080")?;
//!
//!     let ctx = DialContext::with_timeout(Duration::from_secs(10));
//!     let stream = connector.dial(&ctx, "tcp", "example.com:443").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! proxy string -> ProxyEndpointConfig -> Socks5Dialer::dial
//!     -> TCP connect -> greeting -> [auth] -> CONNECT -> reply -> TcpStream
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config, ProxyEndpointConfig};
pub use error::{ConfigError, DialError, ErrorClass};
pub use transport::{create_dialer, Connector, Dial, DialContext, Socks5Dialer};

/// Version of the Socksdial library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
