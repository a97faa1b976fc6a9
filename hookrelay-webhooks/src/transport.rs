//! HTTP transport seam for outbound deliveries

use crate::client::MAX_RESPONSE_BODY;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

/// Most response bytes read per attempt. Receipts keep `MAX_RESPONSE_BODY`
/// characters, at most four bytes each.
pub const MAX_RESPONSE_READ: usize = MAX_RESPONSE_BODY * 4;

/// One outbound POST, fully prepared
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What came back from the consumer
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed `Retry-After` hint
    pub retry_after: Option<Duration>,
    pub body: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Failures below the HTTP layer. Both kinds are transient.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),
}

/// Sends prepared requests. Implemented over reqwest, replaced by fakes in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self.client.post(&request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));

        let mut buf = Vec::new();
        while let Ok(Some(chunk)) = response.chunk().await {
            if !append_capped(&mut buf, &chunk, MAX_RESPONSE_READ) {
                break;
            }
        }
        let body = (!buf.is_empty()).then(|| String::from_utf8_lossy(&buf).into_owned());

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Append up to `limit` total bytes; false once the buffer is full
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    buf.len() < limit
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(
            parse_retry_after("120", Utc::now()),
            Some(Duration::from_secs(120))
        );
        assert_eq!(parse_retry_after(" 0 ", Utc::now()), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        // dates in the past mean "now"
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_retry_after_garbage() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
        assert_eq!(parse_retry_after("-5", Utc::now()), None);
    }

    #[test]
    fn test_append_capped_stops_at_limit() {
        let mut buf = Vec::new();
        assert!(append_capped(&mut buf, b"abc", 8));
        assert!(!append_capped(&mut buf, b"defghijk", 8));
        assert_eq!(buf, b"abcdefgh");
        assert!(!append_capped(&mut buf, b"more", 8));
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_request_header_lookup() {
        let request = OutboundRequest {
            url: "http://localhost/hook".into(),
            headers: vec![("X-Api-Key".into(), "k".into())],
            body: Vec::new(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(request.header("x-api-key"), Some("k"));
        assert_eq!(request.header("x-webhook-signature"), None);
    }
}
