//! Reporting API client.
//!
//! Async HTTP client using `reqwest`; every request carries the key as a
//! Bearer token.

use std::time::Duration;

use killtrack_protocol::constants::{REPORT_DEATH_PATH, REPORT_KILL_PATH, VALIDATE_KEY_PATH};
use killtrack_protocol::{DeathEvent, KillReport};
use reqwest::StatusCode;
use serde::Serialize;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the reporting client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid API key")]
    InvalidKey,
}

/// Reporting API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("killtrack/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the service whether `key` is valid. 200 and 201 mean yes; any
    /// other status means no. Transport failures are errors.
    pub async fn validate_key(&self, key: &str) -> Result<bool, Error> {
        if key.trim().is_empty() {
            return Err(Error::InvalidKey);
        }
        let url = format!("{}{}", self.base_url, VALIDATE_KEY_PATH);
        let resp = self.http.get(&url).bearer_auth(key).send().await?;
        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "key validation response");
        Ok(matches!(status, StatusCode::OK | StatusCode::CREATED))
    }

    /// Posts a kill report.
    pub async fn post_kill(&self, key: &str, report: &KillReport) -> Result<(), Error> {
        self.post(REPORT_KILL_PATH, key, report).await
    }

    /// Posts a death or suicide report.
    pub async fn post_death(&self, key: &str, event: &DeathEvent) -> Result<(), Error> {
        self.post(REPORT_DEATH_PATH, key, event).await
    }

    /// Performs an authenticated JSON POST.
    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        key: &str,
        body: &T,
    ) -> Result<(), Error> {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use killtrack_protocol::{KillMode, SuicideReport};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a mock HTTP server that answers `count` requests with
    /// `status` and `body`, sending each raw request on the returned channel.
    pub(crate) async fn mock_server(
        status: u16,
        body: &str,
        count: usize,
    ) -> (
        String,
        tokio::sync::mpsc::UnboundedReceiver<String>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_string();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            for _ in 0..count {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                let _ = tx.send(request);

                let resp = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, rx, handle)
    }

    /// Reads headers plus a `Content-Length` body.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = vec![0u8; 8192];
        loop {
            let n = stream.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    pub(crate) fn sample_kill() -> KillReport {
        KillReport {
            player: "PlayerA".into(),
            victim: "PlayerB".into(),
            time: "2024-01-01T00:00:00.000Z".into(),
            zone: "OOC_Stanton_1".into(),
            weapon: "KLWE_LaserRepeater_S3".into(),
            damage_type: "Bullet".into(),
            rsi_profile: "https://robertsspaceindustries.com/citizens/PlayerB".into(),
            game_mode: "EA_FreeFlight".into(),
            mode: KillMode::Arena,
            client_ver: "0.1.0".into(),
            killers_ship: "AEGS_Gladius".into(),
            victim_ship: "N/A".into(),
            anonymize_state: false,
        }
    }

    #[tokio::test]
    async fn validate_key_accepts_200_and_201() {
        for status in [200, 201] {
            let (url, mut rx, handle) = mock_server(status, "{}", 1).await;
            let client = Client::new(&url).unwrap();
            assert!(client.validate_key("good-key").await.unwrap(), "{status}");

            let request = rx.recv().await.unwrap();
            assert!(request.starts_with("GET /validateKey"), "{request}");
            assert!(request.contains("Bearer good-key"), "{request}");
            handle.abort();
        }
    }

    #[tokio::test]
    async fn validate_key_rejects_other_status() {
        let (url, _rx, handle) = mock_server(401, r#"{"error":"Unauthorized"}"#, 1).await;
        let client = Client::new(&url).unwrap();
        assert!(!client.validate_key("bad-key").await.unwrap());
        handle.abort();
    }

    #[tokio::test]
    async fn validate_empty_key_is_error() {
        let client = Client::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            client.validate_key("  ").await,
            Err(Error::InvalidKey)
        ));
    }

    #[tokio::test]
    async fn post_kill_sends_json_with_bearer() {
        let (url, mut rx, handle) = mock_server(200, "{}", 1).await;
        let client = Client::new(&format!("{url}/")).unwrap();
        client.post_kill("k1", &sample_kill()).await.unwrap();

        let request = rx.recv().await.unwrap();
        assert!(request.starts_with("POST /reportKill"), "{request}");
        assert!(request.contains("Bearer k1"));
        assert!(request.contains(r#""victim":"PlayerB""#));
        assert!(request.contains(r#""mode":"ac-kill""#));
        handle.abort();
    }

    #[tokio::test]
    async fn post_death_suicide_body() {
        let (url, mut rx, handle) = mock_server(201, "", 1).await;
        let client = Client::new(&url).unwrap();
        let event = DeathEvent::Suicide(SuicideReport {
            player: "PlayerA".into(),
            time: "t".into(),
            zone: "OOC_Stanton_1".into(),
        });
        client.post_death("k1", &event).await.unwrap();

        let request = rx.recv().await.unwrap();
        assert!(request.starts_with("POST /reportDeath"), "{request}");
        assert!(request.contains(r#""player":"PlayerA""#));
        assert!(!request.contains("killer"));
        handle.abort();
    }

    #[tokio::test]
    async fn post_error_status_is_api_error() {
        let (url, _rx, handle) = mock_server(500, "boom", 1).await;
        let client = Client::new(&url).unwrap();
        let err = client.post_kill("k1", &sample_kill()).await.unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        handle.abort();
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = Client::new("https://example.com/api/").unwrap();
        assert_eq!(client.base_url(), "https://example.com/api");
    }
}
