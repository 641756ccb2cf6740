//! Test utilities and mocks for Socksdial
//!
//! This module provides fake SOCKS5 proxies and echo servers used across
//! integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Accept one connection and hand it to `handler`
pub async fn spawn_proxy<F, Fut>(handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (listener, addr) = create_test_listener().await;
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        handler(stream).await;
    });
    (addr, handle)
}

/// Accept connections forever and echo whatever each one sends
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Read exactly `expected.len()` bytes and compare
pub async fn expect_bytes(stream: &mut TcpStream, expected: &[u8]) {
    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, expected);
}

/// Assert the peer closed its side of the connection
pub async fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("client did not close the connection")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

/// Serve a no-auth handshake for an IPv4 CONNECT, then echo
pub async fn serve_no_auth_then_echo(mut stream: TcpStream, ip: [u8; 4], port: u16) {
    expect_bytes(&mut stream, &socks5_mock::greeting_no_auth()).await;
    stream.write_all(&[5, 0]).await.unwrap();
    expect_bytes(&mut stream, &socks5_mock::connect_ipv4(ip, port)).await;
    stream
        .write_all(&socks5_mock::reply_ipv4(0, [127, 0, 0, 1], 1080))
        .await
        .unwrap();

    let (mut reader, mut writer) = stream.split();
    let _ = tokio::io::copy(&mut reader, &mut writer).await;
}

/// Wire messages a SOCKS5 client is expected to send, and proxy replies
pub mod socks5_mock {
    use socksdial::socks::consts::*;

    /// Method selection offering no-auth only
    pub fn greeting_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Method selection offering no-auth and username/password
    pub fn greeting_with_password() -> Vec<u8> {
        vec![
            SOCKS5_VERSION,
            2,
            SOCKS5_AUTH_METHOD_NONE,
            SOCKS5_AUTH_METHOD_PASSWORD,
        ]
    }

    /// Username/password sub-negotiation request
    pub fn auth_request(username: &str, password: &str) -> Vec<u8> {
        let mut request = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        request.extend_from_slice(username.as_bytes());
        request.push(password.len() as u8);
        request.extend_from_slice(password.as_bytes());
        request
    }

    /// CONNECT to an IPv4 address
    pub fn connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// CONNECT to a domain name
    pub fn connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// CONNECT reply with an IPv4 bound address
    pub fn reply_ipv4(status: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut reply = vec![SOCKS5_VERSION, status, SOCKS5_RESERVED, SOCKS5_ADDR_TYPE_IPV4];
        reply.extend_from_slice(&ip);
        reply.extend_from_slice(&port.to_be_bytes());
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_test_listener() {
        let (listener, addr) = create_test_listener().await;
        assert!(addr.port() > 0);
        drop(listener);
    }

    #[test]
    fn test_socks5_mock_connect_ipv4() {
        let cmd = socks5_mock::connect_ipv4([192, 168, 1, 1], 8080);
        assert_eq!(cmd[0], 5); // SOCKS5 version
        assert_eq!(cmd[1], 1); // CONNECT
        assert_eq!(cmd[3], 1); // IPv4
        assert_eq!(&cmd[4..8], &[192, 168, 1, 1]);
    }

    #[test]
    fn test_socks5_mock_reply_len() {
        assert_eq!(socks5_mock::reply_ipv4(5, [0; 4], 0).len(), 10);
    }
}
