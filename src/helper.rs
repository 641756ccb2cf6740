//! Helper utilities for Socksdial
//!
//! Deadline handling shared by the dialers and the SOCKS5 handshake.

use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline applied to connect plus handshake when the caller sets none
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 30;

/// TCP keep-alive idle time for dialed connections
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

/// TCP keep-alive probe interval for dialed connections
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 10;

/// Parse duration from seconds
pub fn duration_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Error returned when an operation runs past its deadline
pub fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "i/o deadline exceeded")
}

/// Run `fut`, failing with `TimedOut` once `deadline` has passed
///
/// `None` means no deadline.
pub async fn with_deadline<F, T, E>(deadline: Option<Instant>, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<io::Error>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| E::from(deadline_exceeded()))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_DIAL_TIMEOUT_SECS, 30);
        assert_eq!(DEFAULT_KEEPALIVE_SECS, 30);
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(5), Duration::from_secs(5));
        assert_eq!(duration_from_secs(0), Duration::from_secs(0));
    }

    #[tokio::test]
    async fn test_with_deadline_none() {
        let result: io::Result<u8> = with_deadline(None, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_deadline_elapsed() {
        let deadline = Instant::now() + Duration::from_millis(20);
        let result: io::Result<()> = with_deadline(Some(deadline), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_with_deadline_in_time() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result: io::Result<&str> = with_deadline(Some(deadline), async { Ok("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_with_deadline_passes_inner_error() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result: io::Result<()> = with_deadline(Some(deadline), async {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::ConnectionReset);
    }
}
