// OAuth2 client-credentials token cache for the REST GDS connectors.
// Each connector owns one cache; the async mutex is held across the refresh
// call so a connector never issues two concurrent token requests against the
// same credential.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::OAuthCredentials;
use crate::error::ConnectorError;

/// Tokens are refreshed this long before their reported expiry.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    acquired_at: Instant,
    lifetime: Duration,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.acquired_at + self.lifetime
    }
}

pub struct TokenCache {
    http: reqwest::Client,
    credentials: OAuthCredentials,
    state: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(http: reqwest::Client, credentials: OAuthCredentials) -> Self {
        Self {
            http,
            credentials,
            state: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, reusing the cached one while it is
    /// fresh and refreshing it otherwise.
    pub async fn bearer_token(&self) -> Result<String, ConnectorError> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }
        debug!(token_url = %self.credentials.token_url, "acquiring OAuth2 token");
        let fresh = self.request_token().await?;
        let bearer = fresh.access_token.clone();
        *state = Some(fresh);
        Ok(bearer)
    }

    async fn request_token(&self) -> Result<CachedToken, ConnectorError> {
        let response = self
            .http
            .post(&self.credentials.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Auth(format!("invalid token response: {e}")))?;

        Ok(CachedToken {
            access_token: token.access_token,
            acquired_at: Instant::now(),
            lifetime: Duration::from_secs(token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn token(lifetime_secs: u64) -> CachedToken {
        CachedToken {
            access_token: "tok".to_string(),
            acquired_at: Instant::now(),
            lifetime: Duration::from_secs(lifetime_secs),
        }
    }

    #[test]
    fn fresh_token_is_reused() {
        let tok = token(1800);
        assert!(tok.is_fresh(Instant::now()));
    }

    #[test]
    fn token_near_expiry_is_refreshed_early() {
        let tok = token(1800);
        // 30s of lifetime left, inside the 60s safety margin.
        let near_expiry = tok.acquired_at + Duration::from_secs(1770);
        assert!(!tok.is_fresh(near_expiry));
    }

    #[test]
    fn expired_token_is_not_fresh() {
        let tok = token(10);
        assert!(!tok.is_fresh(tok.acquired_at + Duration::from_secs(11)));
    }

    async fn read_http_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Minimal token endpoint on a local socket. Counts requests so tests
    /// can assert how many refreshes actually hit the wire.
    async fn spawn_token_stub(hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                hits.fetch_add(1, Ordering::SeqCst);
                read_http_request(&mut socket).await;
                let body = r#"{"access_token":"stub-token","expires_in":3600}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/oauth/token")
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token_url = spawn_token_stub(Arc::clone(&hits)).await;

        let cache = Arc::new(TokenCache::new(
            reqwest::Client::new(),
            OAuthCredentials {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                token_url,
            },
        ));

        let (first, second) = tokio::join!(cache.bearer_token(), cache.bearer_token());
        assert_eq!(first.unwrap(), "stub-token");
        assert_eq!(second.unwrap(), "stub-token");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_token_is_reused_across_calls() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token_url = spawn_token_stub(Arc::clone(&hits)).await;

        let cache = TokenCache::new(
            reqwest::Client::new(),
            OAuthCredentials {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                token_url,
            },
        );

        cache.bearer_token().await.unwrap();
        cache.bearer_token().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
