//! Bulk actions: a bounded-concurrency queue with per-item results.
//!
//! A failing item never stops the rest. Results keep input order.
//! No rollback of items that already succeeded.

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::GovError;

pub const DEFAULT_BULK_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub target: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkReport {
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Run `op` for every item with at most `concurrency` in flight.
pub async fn run_bulk<T, R, F, Fut>(items: Vec<T>, concurrency: usize, op: F) -> BulkReport
where
    T: Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, GovError>>,
{
    let results: Vec<BulkItemResult> = stream::iter(items)
        .map(|item| {
            let target = item.to_string();
            let fut = op(item);
            async move {
                match fut.await {
                    Ok(_) => BulkItemResult {
                        target,
                        success: true,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!(%target, error = %e, "bulk item failed");
                        BulkItemResult {
                            target,
                            success: false,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    BulkReport::from_results(results)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn continues_past_failures_in_order() {
        let report = run_bulk(vec![1, 2, 3, 4], 2, |n| async move {
            if n % 2 == 0 {
                Err(GovError::NotFound(format!("item {n}")))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 2);
        let targets: Vec<&str> = report.results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["1", "2", "3", "4"]);
        assert_eq!(report.results[1].error.as_deref(), Some("not found: item 2"));
        assert!(!report.all_succeeded());
    }

    #[tokio::test]
    async fn respects_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let report = run_bulk((0..10).collect(), 3, |_n: i32| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, GovError>(())
            }
        })
        .await;
        assert!(report.all_succeeded());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs() {
        let report = run_bulk(vec!["a"], 0, |_s| async { Ok::<_, GovError>(()) }).await;
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn empty_input() {
        let report = run_bulk(Vec::<u8>::new(), 4, |_n| async { Ok::<_, GovError>(()) }).await;
        assert_eq!(report, BulkReport::default());
    }
}
