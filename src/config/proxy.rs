//! SOCKS5 proxy endpoint configuration
//!
//! Parses `[socks5://][user[:password]@]host:port` into a [`ProxyEndpointConfig`].

use crate::error::ConfigError;
use crate::socks::consts::MAX_CREDENTIAL_LEN;
use percent_encoding::percent_decode_str;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Scheme accepted in proxy strings
pub const SOCKS5_SCHEME: &str = "socks5";

/// Proxy address and optional credentials
///
/// Immutable once built; shared read-only by every dial made through the
/// dialer that owns it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxyEndpointConfig {
    address: String,
    username: String,
    password: String,
}

impl ProxyEndpointConfig {
    /// Create a configuration without credentials
    pub fn new(address: impl Into<String>) -> Self {
        ProxyEndpointConfig {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Set username and password
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Parse a proxy string
    ///
    /// A missing `scheme://` prefix is treated as `socks5://`. Username and
    /// password are percent-decoded.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let normalized = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("{}://{}", SOCKS5_SCHEME, raw)
        };

        let url = Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
            url: normalized.clone(),
            source,
        })?;

        if url.scheme() != SOCKS5_SCHEME {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(ConfigError::EmptyAddress),
        };
        let port = url
            .port()
            .ok_or_else(|| ConfigError::MissingPort(host.to_string()))?;

        Ok(ProxyEndpointConfig {
            address: format!("{}:{}", host, port),
            username: decode_userinfo("username", url.username())?,
            password: decode_userinfo("password", url.password().unwrap_or_default())?,
        })
    }

    /// Proxy `host:port`
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Username, empty when none was given
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password, empty when none was given
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether the greeting should offer username/password
    ///
    /// Requires a non-empty username; an empty password is allowed.
    pub fn offers_password_auth(&self) -> bool {
        !self.username.is_empty()
            && self.username.len() < MAX_CREDENTIAL_LEN
            && self.password.len() < MAX_CREDENTIAL_LEN
    }
}

fn decode_userinfo(field: &'static str, raw: &str) -> Result<String, ConfigError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ConfigError::InvalidCredentials(field))
}

impl FromStr for ProxyEndpointConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProxyEndpointConfig::parse(s)
    }
}

impl fmt::Debug for ProxyEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpointConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl fmt::Display for ProxyEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.username.is_empty() {
            write!(f, "{}://{}", SOCKS5_SCHEME, self.address)
        } else {
            write!(f, "{}://{}@{}", SOCKS5_SCHEME, self.username, self.address)
        }
    }
}
