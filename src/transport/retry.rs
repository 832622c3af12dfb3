//! Retry policy for deliveries that did not reach the partner.

use std::future::Future;
use std::time::Duration;

use http::StatusCode;
use tokio::time::sleep;

use crate::pipeline::SendOutcome;

/// Exponential backoff between delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds
    pub base_backoff_ms: u64,
    /// Upper bound for a single delay in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

impl ExponentialBackoff {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the failed attempt number `attempt` (zero based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self.base_backoff_ms.saturating_mul(1 << attempt.min(10));
        Duration::from_millis(backoff.min(self.max_backoff_ms))
    }

    /// Whether `outcome` of attempt `attempt` is worth repeating.
    ///
    /// Only transport failures, 5xx and 429 are transient. Any other answer
    /// is final: the partner saw the message.
    pub fn should_retry(&self, attempt: u32, outcome: &SendOutcome) -> bool {
        let transient = match outcome {
            SendOutcome::Failed(_) => true,
            SendOutcome::Response { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            },
        };
        transient && attempt + 1 < self.max_attempts
    }

    /// Run `attempt` until it succeeds or the policy gives up, returning
    /// the last outcome.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> SendOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = SendOutcome>,
    {
        let mut n = 0;
        loop {
            let outcome = attempt(n).await;
            if !self.should_retry(n, &outcome) {
                return outcome;
            }
            let delay = self.backoff(n);
            tracing::debug!(attempt = n + 1, delay_ms = delay.as_millis() as u64, "delivery failed, retrying");
            sleep(delay).await;
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::InboundRequest;
    use crate::mime::Headers;

    fn answered(status: StatusCode) -> SendOutcome {
        SendOutcome::Response {
            status,
            response: InboundRequest::new(Headers::new(), Vec::new()),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ExponentialBackoff::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), Duration::from_millis(30000));
    }

    #[test]
    fn test_only_transient_outcomes_retry() {
        let policy = ExponentialBackoff::default();
        assert!(policy.should_retry(0, &SendOutcome::Failed("refused".into())));
        assert!(policy.should_retry(0, &answered(StatusCode::SERVICE_UNAVAILABLE)));
        assert!(policy.should_retry(1, &answered(StatusCode::TOO_MANY_REQUESTS)));
        assert!(!policy.should_retry(0, &answered(StatusCode::OK)));
        assert!(!policy.should_retry(0, &answered(StatusCode::BAD_REQUEST)));
        assert!(!policy.should_retry(2, &SendOutcome::Failed("refused".into())));
        assert!(!ExponentialBackoff::none().should_retry(0, &SendOutcome::Failed("x".into())));
    }

    #[tokio::test]
    async fn test_run_stops_at_max_attempts() {
        let policy = ExponentialBackoff {
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
        };
        let mut calls = 0;
        let outcome = policy
            .run(|_| {
                calls += 1;
                async { SendOutcome::Failed("refused".into()) }
            })
            .await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_success() {
        let policy = ExponentialBackoff {
            max_attempts: 5,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
        };
        let mut calls = 0;
        let outcome = policy
            .run(|n| {
                calls += 1;
                async move {
                    if n == 0 {
                        SendOutcome::Failed("reset".into())
                    } else {
                        answered(StatusCode::OK)
                    }
                }
            })
            .await;
        assert!(matches!(outcome, SendOutcome::Response { status, .. } if status == StatusCode::OK));
        assert_eq!(calls, 2);
    }
}
