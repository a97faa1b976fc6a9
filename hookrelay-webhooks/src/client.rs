//! Delivery client: signs descriptors and POSTs them with retries

use crate::signature::headers;
use crate::{
    EmitterConfig, EventDescriptor, HttpTransport, OutboundRequest, Result, SignedDescriptor,
    StatusClass, Transport, WebhookError, WebhookSignature,
};
use hookrelay_config::Validate;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Maximum length of a response body kept on a receipt or error
pub const MAX_RESPONSE_BODY: usize = 1024;

/// Successful delivery
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    /// Event id carried in the body and the id header
    pub event_id: Uuid,
    /// Final 2xx status
    pub status: u16,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Wall time from first attempt to acknowledgement
    pub elapsed: Duration,
    /// Response body, truncated
    pub response_body: Option<String>,
}

/// Sends event descriptors to the automation consumer.
///
/// Cloning is cheap; clones share the transport. Nothing is locked while a
/// request is in flight, so concurrent deliveries do not coordinate.
#[derive(Debug)]
pub struct DeliveryClient<T: Transport = HttpTransport> {
    config: Arc<EmitterConfig>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for DeliveryClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl DeliveryClient<HttpTransport> {
    /// Validate the configuration and build a reqwest-backed client
    pub fn new(config: EmitterConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }
}

impl<T: Transport> DeliveryClient<T> {
    /// Validate the configuration and use the given transport
    pub fn with_transport(config: EmitterConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Deliver to the configured endpoint with the configured key and secret
    pub async fn deliver_configured(&self, descriptor: &EventDescriptor) -> Result<DeliveryReceipt> {
        let config = Arc::clone(&self.config);
        self.deliver(
            descriptor,
            &config.endpoint(),
            &config.api_key,
            config.secret.as_deref(),
        )
        .await
    }

    /// Serialize, sign (when a secret is given) and POST a descriptor.
    ///
    /// Transient failures are retried per the configured policy; only the
    /// final outcome is returned. Delivery is at-least-once: the consumer may
    /// see the same `eventId` more than once.
    pub async fn deliver(
        &self,
        descriptor: &EventDescriptor,
        endpoint: &str,
        api_key: &str,
        secret: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        match secret {
            Some(secret) => {
                let signed = WebhookSignature::new(secret).seal(descriptor.clone())?;
                self.deliver_signed(&signed, endpoint, api_key).await
            }
            None => self.send(descriptor, None, endpoint, api_key).await,
        }
    }

    /// POST an already signed descriptor
    pub async fn deliver_signed(
        &self,
        signed: &SignedDescriptor,
        endpoint: &str,
        api_key: &str,
    ) -> Result<DeliveryReceipt> {
        self.send(signed.descriptor(), Some(signed.signature()), endpoint, api_key)
            .await
    }

    async fn send(
        &self,
        descriptor: &EventDescriptor,
        signature: Option<&str>,
        endpoint: &str,
        api_key: &str,
    ) -> Result<DeliveryReceipt> {
        if api_key.trim().is_empty() {
            return Err(WebhookError::ConfigurationError(
                "API key must not be empty".to_string(),
            ));
        }
        let url = url::Url::parse(endpoint)
            .map_err(|e| WebhookError::ConfigurationError(format!("endpoint `{}`: {}", endpoint, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WebhookError::ConfigurationError(format!(
                "endpoint `{}` must use http or https",
                endpoint
            )));
        }

        let body = descriptor.canonical_bytes()?;
        if body.len() > self.config.max_payload_size {
            return Err(WebhookError::PayloadTooLarge {
                size: body.len(),
                max: self.config.max_payload_size,
            });
        }

        let mut request_headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (headers::API_KEY.to_string(), api_key.to_string()),
            (headers::WEBHOOK_ID.to_string(), descriptor.event_id().to_string()),
            (headers::EVENT_TYPE.to_string(), descriptor.event_type().to_string()),
            (headers::ENTITY_CLASS.to_string(), descriptor.entity_class().to_string()),
        ];
        if let Some(signature) = signature {
            request_headers.push((headers::SIGNATURE.to_string(), signature.to_string()));
        }

        let request = OutboundRequest {
            url: url.into(),
            headers: request_headers,
            body,
            timeout: self.config.timeout,
        };

        self.execute_with_retries(descriptor, request).await
    }

    /// Run the attempt loop. Each attempt is a fresh request carrying the
    /// same body and event id; only the attempt header changes.
    async fn execute_with_retries(
        &self,
        descriptor: &EventDescriptor,
        request: OutboundRequest,
    ) -> Result<DeliveryReceipt> {
        let policy = &self.config.retry;
        let event_id = descriptor.event_id();
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                %event_id,
                entity_class = descriptor.entity_class(),
                event_type = %descriptor.event_type(),
                attempt,
                url = %request.url,
                "webhook delivery attempt"
            );

            let mut attempt_request = request.clone();
            attempt_request
                .headers
                .push((headers::ATTEMPT.to_string(), attempt.to_string()));

            let (failure, retry_after) = match self.transport.send(attempt_request).await {
                Ok(response) => match StatusClass::of(response.status) {
                    StatusClass::Success => {
                        info!(
                            %event_id,
                            status = response.status,
                            attempt,
                            "webhook delivered"
                        );
                        return Ok(DeliveryReceipt {
                            event_id,
                            status: response.status,
                            attempts: attempt,
                            elapsed: started.elapsed(),
                            response_body: response.body.map(|b| truncate_string(&b, MAX_RESPONSE_BODY)),
                        });
                    }
                    StatusClass::Rejected => {
                        warn!(
                            %event_id,
                            status = response.status,
                            attempt,
                            "webhook rejected by consumer, not retrying"
                        );
                        return Err(WebhookError::RejectedDelivery {
                            status: response.status,
                            attempts: attempt,
                            body: response.body.map(|b| truncate_string(&b, MAX_RESPONSE_BODY)),
                        });
                    }
                    StatusClass::RateLimited | StatusClass::Transient => (
                        WebhookError::TransientDelivery(format!("HTTP {}", response.status)),
                        response.retry_after,
                    ),
                },
                Err(e) => (WebhookError::TransientDelivery(e.to_string()), None),
            };

            if !policy.should_retry(attempt) {
                let message = match failure {
                    WebhookError::TransientDelivery(message) => message,
                    other => other.to_string(),
                };
                error!(
                    %event_id,
                    entity_class = descriptor.entity_class(),
                    event_type = %descriptor.event_type(),
                    attempts = attempt,
                    error = %message,
                    "webhook delivery failed, retries exhausted"
                );
                return Err(WebhookError::DeliveryFailed {
                    attempts: attempt,
                    message,
                });
            }

            let delay = policy.delay_with_hint(attempt, retry_after);
            warn!(
                %event_id,
                attempt,
                error = %failure,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "webhook delivery attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Truncate to at most `max_chars` characters, on a char boundary
fn truncate_string(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, RetryPolicy, TransportError, TransportResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a scripted list of responses and records every request
    struct ScriptedTransport {
        script: Mutex<Vec<std::result::Result<TransportResponse, TransportError>>>,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<std::result::Result<TransportResponse, TransportError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<OutboundRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: OutboundRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(TransportResponse::new(200)))
        }
    }

    fn config(max_attempts: u32) -> EmitterConfig {
        EmitterConfig::builder("http://consumer.test", "api-key")
            .secret("s3cret")
            .retry_policy(RetryPolicy::fixed(max_attempts, Duration::from_millis(10)))
            .build()
    }

    fn descriptor() -> EventDescriptor {
        EventDescriptor::new("Order", EventType::Created).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt_sets_headers() {
        let client =
            DeliveryClient::with_transport(config(3), ScriptedTransport::new(vec![])).unwrap();
        let descriptor = descriptor();

        let receipt = client.deliver_configured(&descriptor).await.unwrap();
        assert_eq!(receipt.attempts, 1);
        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.event_id, descriptor.event_id());

        let requests = client.transport().requests();
        let request = &requests[0];
        assert_eq!(request.url, "http://consumer.test/webhooks/lifecycle");
        assert_eq!(request.header("x-api-key"), Some("api-key"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("x-webhook-attempt"), Some("1"));
        assert_eq!(request.body, descriptor.canonical_bytes().unwrap());

        let signature = request.header("x-webhook-signature").unwrap();
        assert!(WebhookSignature::new("s3cret").verify_bytes(&request.body, signature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_signature_without_secret() {
        let client =
            DeliveryClient::with_transport(config(1), ScriptedTransport::new(vec![])).unwrap();

        client
            .deliver(&descriptor(), "http://consumer.test/hook", "key", None)
            .await
            .unwrap();

        let requests = client.transport().requests();
        assert!(requests[0].header("x-webhook-signature").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success_with_stable_event_id() {
        let script = vec![
            Err(TransportError::Network("connection refused".into())),
            Err(TransportError::Timeout(Duration::from_secs(30))),
            Ok(TransportResponse::new(202)),
        ];
        let client =
            DeliveryClient::with_transport(config(3), ScriptedTransport::new(script)).unwrap();

        let receipt = client.deliver_configured(&descriptor()).await.unwrap();
        assert_eq!(receipt.attempts, 3);
        assert_eq!(receipt.status, 202);

        let requests = client.transport().requests();
        let ids: Vec<_> = requests.iter().map(|r| r.header("x-webhook-id")).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        let attempts: Vec<_> = requests.iter().map(|r| r.header("x-webhook-attempt")).collect();
        assert_eq!(attempts, vec![Some("1"), Some("2"), Some("3")]);
        assert!(requests.windows(2).all(|w| w[0].body == w[1].body));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_honours_retry_after() {
        let script = vec![
            Ok(TransportResponse::new(429).with_retry_after(Duration::from_millis(5))),
            Ok(TransportResponse::new(200)),
        ];
        let client =
            DeliveryClient::with_transport(config(3), ScriptedTransport::new(script)).unwrap();

        let started = tokio::time::Instant::now();
        let receipt = client.deliver_configured(&descriptor()).await.unwrap();
        assert_eq!(receipt.attempts, 2);
        // the 5ms hint wins over the 10ms policy delay
        assert!(started.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_body_is_kept() {
        let script = vec![Ok(TransportResponse::new(422).with_body("unknown entity"))];
        let client =
            DeliveryClient::with_transport(config(3), ScriptedTransport::new(script)).unwrap();

        match client.deliver_configured(&descriptor()).await {
            Err(WebhookError::RejectedDelivery {
                status,
                attempts,
                body,
            }) => {
                assert_eq!(status, 422);
                assert_eq!(attempts, 1);
                assert_eq!(body.as_deref(), Some("unknown entity"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_status_is_not_retried() {
        let script = vec![
            Ok(TransportResponse::new(408)),
            Ok(TransportResponse::new(408)),
            Ok(TransportResponse::new(408)),
        ];
        let client =
            DeliveryClient::with_transport(config(3), ScriptedTransport::new(script)).unwrap();

        let err = client.deliver_configured(&descriptor()).await.unwrap_err();
        assert!(matches!(
            err,
            WebhookError::RejectedDelivery {
                status: 408,
                attempts: 1,
                ..
            }
        ));
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_errors_make_no_attempt() {
        let client =
            DeliveryClient::with_transport(config(3), ScriptedTransport::new(vec![])).unwrap();
        let descriptor = descriptor();

        let empty_secret = client
            .deliver(&descriptor, "http://consumer.test/hook", "key", Some(""))
            .await;
        assert!(matches!(empty_secret, Err(WebhookError::ConfigurationError(_))));

        let empty_key = client
            .deliver(&descriptor, "http://consumer.test/hook", "", None)
            .await;
        assert!(matches!(empty_key, Err(WebhookError::ConfigurationError(_))));

        let bad_url = client.deliver(&descriptor, "not a url", "key", None).await;
        assert!(matches!(bad_url, Err(WebhookError::ConfigurationError(_))));

        assert!(client.transport().requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_too_large() {
        let config = EmitterConfig {
            max_payload_size: 10,
            ..config(3)
        };
        let client =
            DeliveryClient::with_transport(config, ScriptedTransport::new(vec![])).unwrap();

        let result = client.deliver_configured(&descriptor()).await;
        assert!(matches!(result, Err(WebhookError::PayloadTooLarge { max: 10, .. })));
        assert!(client.transport().requests().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = EmitterConfig::builder("not-a-url", "key").build();
        assert!(DeliveryClient::new(config).is_err());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdef", 3), "abc...");
        assert_eq!(truncate_string("ééééé", 2), "éé...");
    }
}
