//! Pooling strategies for on-demand requests.
//!
//! - `round_robin`: the next endpoint in rotation, once
//! - `fastest`: every endpoint at the same time; the first 2xx wins
//! - `retry_with_next`: endpoints in order until one answers 2xx

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::config::ValidationError;
use crate::health::probe::HttpProber;
use crate::observability::metrics::{PoolMetrics, NO_RESPONSE};
use crate::pool::endpoint::Endpoint;
use crate::pool::error::PoolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingStrategy {
    #[default]
    RoundRobin,
    Fastest,
    RetryWithNext,
}

impl FromStr for PoolingStrategy {
    type Err = ValidationError;

    /// Accepts `round_robin`, `RoundRobin`, `round-robin` and friends.
    /// An empty tag means round robin.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match tag.as_str() {
            "" | "roundrobin" => Ok(PoolingStrategy::RoundRobin),
            "fastest" => Ok(PoolingStrategy::Fastest),
            "retrywithnext" => Ok(PoolingStrategy::RetryWithNext),
            _ => Err(ValidationError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for PoolingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PoolingStrategy::RoundRobin => "round_robin",
            PoolingStrategy::Fastest => "fastest",
            PoolingStrategy::RetryWithNext => "retry_with_next",
        };
        f.write_str(tag)
    }
}

/// Result of one on-demand request.
#[derive(Debug, Clone, Serialize)]
pub struct Dispatched {
    pub endpoint: String,
    /// `None` when no HTTP response arrived.
    pub status: Option<u16>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl Dispatched {
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Send one request over `endpoints` following `strategy`.
///
/// For round robin the caller passes the single endpoint it selected.
pub(crate) async fn dispatch(
    strategy: PoolingStrategy,
    prober: &HttpProber,
    metrics: &PoolMetrics,
    endpoints: &[Endpoint],
    body: Option<&str>,
) -> Result<Dispatched, PoolError> {
    let attempted = endpoints.len();
    let failed = || PoolError::AllEndpointsFailed { attempted };

    match strategy {
        PoolingStrategy::RoundRobin | PoolingStrategy::RetryWithNext => {
            for endpoint in endpoints {
                let outcome = attempt(prober, metrics, endpoint, body).await;
                if outcome.is_success() {
                    return Ok(outcome);
                }
                if strategy == PoolingStrategy::RoundRobin {
                    break;
                }
            }
            Err(failed())
        }
        PoolingStrategy::Fastest => {
            let mut racing: FuturesUnordered<_> = endpoints
                .iter()
                .map(|endpoint| attempt(prober, metrics, endpoint, body))
                .collect();

            // Dropping the stream cancels the slower requests.
            while let Some(outcome) = racing.next().await {
                if outcome.is_success() {
                    return Ok(outcome);
                }
            }
            Err(failed())
        }
    }
}

async fn attempt(
    prober: &HttpProber,
    metrics: &PoolMetrics,
    endpoint: &Endpoint,
    body: Option<&str>,
) -> Dispatched {
    let started = Instant::now();
    let result = prober.request(endpoint, body).await;
    let elapsed = started.elapsed();

    metrics.record_duration(endpoint.name(), elapsed);
    let status = match result {
        Ok(status) => {
            metrics.record_response_code(endpoint.name(), status.as_str());
            Some(status.as_u16())
        }
        Err(e) => {
            metrics.record_response_code(endpoint.name(), NO_RESPONSE);
            tracing::debug!(endpoint = %endpoint.name(), error = %e, "Dispatch attempt failed");
            None
        }
    };

    Dispatched {
        endpoint: endpoint.name().to_string(),
        status,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        let parse = |s: &str| s.parse::<PoolingStrategy>();
        assert_eq!(parse(""), Ok(PoolingStrategy::RoundRobin));
        assert_eq!(parse("round_robin"), Ok(PoolingStrategy::RoundRobin));
        assert_eq!(parse("RoundRobin"), Ok(PoolingStrategy::RoundRobin));
        assert_eq!(parse("fastest"), Ok(PoolingStrategy::Fastest));
        assert_eq!(parse("retry-with-next"), Ok(PoolingStrategy::RetryWithNext));
        assert_eq!(parse("RetryWithNext"), Ok(PoolingStrategy::RetryWithNext));
        assert_eq!(
            parse("random"),
            Err(ValidationError::UnknownStrategy("random".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for strategy in [
            PoolingStrategy::RoundRobin,
            PoolingStrategy::Fastest,
            PoolingStrategy::RetryWithNext,
        ] {
            assert_eq!(strategy.to_string().parse::<PoolingStrategy>(), Ok(strategy));
        }
    }

    #[test]
    fn test_dispatched_success() {
        let outcome = |status| Dispatched {
            endpoint: "a".to_string(),
            status,
            elapsed: Duration::ZERO,
        };
        assert!(outcome(Some(204)).is_success());
        assert!(!outcome(Some(500)).is_success());
        assert!(!outcome(None).is_success());
    }
}
