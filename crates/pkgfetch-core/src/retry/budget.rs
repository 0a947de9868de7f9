//! Per-drain retry budget and the tagged outcome of one attempt.

use crate::error::{FetchError, TransportFailures};

/// Outcome of one retrieval attempt against one mirror.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// Spend budget and try again, possibly elsewhere.
    Retryable(FetchError),
    /// Stop immediately; no budget is spent.
    Fatal(FetchError),
}

impl<T> From<Result<T, FetchError>> for Attempt<T> {
    fn from(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(v) => Attempt::Success(v),
            Err(e) if e.is_retryable() => Attempt::Retryable(e),
            Err(e) => Attempt::Fatal(e),
        }
    }
}

/// Number of retryable failures a drain may absorb before giving up.
#[derive(Debug)]
pub struct RetryBudget {
    remaining: i64,
    failures: TransportFailures,
}

impl RetryBudget {
    /// `max_timeout` attempts per endpoint plus one extra round when mirrors
    /// are configured; just `max_timeout` for a lone origin.
    pub fn for_endpoints(max_timeout: u32, mirror_count: usize) -> Self {
        let per_endpoint = i64::from(max_timeout);
        let remaining = if mirror_count > 0 {
            per_endpoint.saturating_mul(mirror_count as i64 + 1)
        } else {
            per_endpoint
        };
        Self {
            remaining,
            failures: TransportFailures::new(),
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn failures(&self) -> &TransportFailures {
        &self.failures
    }

    /// Spend one unit on `error`. Once the budget is gone, returns the
    /// aggregate of everything recorded.
    pub fn spend(&mut self, error: FetchError) -> Result<(), FetchError> {
        self.failures.push(error);
        self.remaining -= 1;
        if self.remaining <= 0 {
            return Err(FetchError::Failures(std::mem::take(&mut self.failures)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_error(url: &str) -> FetchError {
        FetchError::TransferContent {
            url: url.to_string(),
            reason: "recv failure".to_string(),
        }
    }

    #[test]
    fn budget_scales_with_mirrors() {
        assert_eq!(RetryBudget::for_endpoints(4, 0).remaining(), 4);
        assert_eq!(RetryBudget::for_endpoints(4, 1).remaining(), 8);
        assert_eq!(RetryBudget::for_endpoints(4, 3).remaining(), 16);
    }

    #[test]
    fn exhaustion_returns_deduplicated_failures() {
        let mut budget = RetryBudget::for_endpoints(3, 0);
        budget.spend(content_error("http://a/")).unwrap();
        budget.spend(content_error("http://a/")).unwrap();
        match budget.spend(content_error("http://b/")) {
            Err(FetchError::Failures(f)) => {
                assert_eq!(f.len(), 2);
                assert_eq!(f.total(), 3);
            }
            other => panic!("expected Failures, got {other:?}"),
        }
    }

    #[test]
    fn attempt_tags_follow_retryability() {
        let ok: Attempt<usize> = Ok(3).into();
        assert!(matches!(ok, Attempt::Success(3)));
        let retry: Attempt<usize> = Err(content_error("http://a/")).into();
        assert!(matches!(retry, Attempt::Retryable(_)));
        let fatal: Attempt<usize> = Err(FetchError::Cancelled).into();
        assert!(matches!(fatal, Attempt::Fatal(FetchError::Cancelled)));
    }
}
