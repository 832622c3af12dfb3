//! reqwest-backed sender.

use std::time::Duration;

use reqwest::Client;

use crate::config::HttpConfig;
use crate::error::{As2Error, Result};
use crate::mime::Headers;
use crate::pipeline::{InboundRequest, OutboundMessage, SendOutcome};

use super::ExponentialBackoff;

/// Sends AS2 messages and asynchronous MDNs over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: Client,
    retry: ExponentialBackoff,
}

impl HttpSender {
    /// Create a sender with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| As2Error::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry: ExponentialBackoff::none(),
        })
    }

    /// Create a sender from the HTTP settings.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(Duration::from_secs(config.timeout_secs))?.with_retry(ExponentialBackoff {
            max_attempts: config.max_attempts.max(1),
            base_backoff_ms: config.retry_backoff_ms,
            ..ExponentialBackoff::default()
        }))
    }

    /// Set the policy used by [`HttpSender::send_with_retry`].
    pub fn with_retry(mut self, retry: ExponentialBackoff) -> Self {
        self.retry = retry;
        self
    }

    /// [`HttpSender::send`], repeated while the outcome is transient.
    pub async fn send_with_retry(&self, message: &OutboundMessage) -> SendOutcome {
        self.retry.run(|_| self.send(message)).await
    }

    /// POST `message` to its URL.
    ///
    /// Transport problems never surface as errors: they are reported as
    /// [`SendOutcome::Failed`] so the pipeline can record the state.
    pub async fn send(&self, message: &OutboundMessage) -> SendOutcome {
        let Some(url) = message.url.as_deref() else {
            return SendOutcome::Failed(format!("no target URL for {}", message.message_id));
        };

        let mut request = self.client.post(url).body(message.body.clone());
        for (name, value) in message.headers.iter() {
            request = request.header(name, value);
        }

        tracing::info!(
            message_id = %message.message_id,
            url,
            bytes = message.body.len(),
            "sending AS2 message"
        );

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let headers: Headers = response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect();

                match response.bytes().await {
                    Ok(body) => {
                        tracing::debug!(message_id = %message.message_id, %status, bytes = body.len(), "peer answered");
                        SendOutcome::Response {
                            status,
                            response: InboundRequest::new(headers, body.to_vec()),
                        }
                    },
                    Err(e) => SendOutcome::Failed(format!("Failed to read response: {e}")),
                }
            },
            Err(e) => SendOutcome::Failed(format!("Request failed: {e}")),
        }
    }
}
