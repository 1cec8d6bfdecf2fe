//! Runs one adapter invocation inside a timeout and an error boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinError;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{SourceFailure, SourceOutcome};
use crate::adapters::{AdapterQuery, ListingSink};
use crate::error::panic_message;
use crate::Adapter;

/// Invoke `adapter` for `query` and reduce whatever happens to a terminal
/// `SourceOutcome`.
///
/// - completes: `Success` with every listing pushed
/// - errors after pushing listings: `PartialFailure`, listings kept
/// - errors with nothing pushed: `Failed`
/// - panics: `Failed` with code `panic`
/// - exceeds `limit`: the adapter task is aborted and the outcome is
///   `TimedOut` with no listings
///
/// The adapter runs on a task of its own and the deadline is awaited here,
/// so it holds even when the adapter blocks the thread it runs on.
pub async fn run(
    adapter: Arc<dyn Adapter>,
    query: Arc<AdapterQuery>,
    limit: Duration,
) -> SourceOutcome {
    let source = adapter.id();
    let timeout_ms = limit.as_millis() as u64;
    let start = Instant::now();

    debug!(target: "audiosearch.runner", source, timeout_ms, "adapter started");

    let mut task = tokio::spawn(async move {
        let mut sink = ListingSink::new(adapter.id());
        let result = adapter.search(&query, &mut sink).await;
        (sink, result)
    });

    let joined = match timeout(limit, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            task.abort();
            let duration_ms = start.elapsed().as_millis() as u64;
            warn!(
                target: "audiosearch.runner",
                source,
                timeout_ms,
                "adapter timed out"
            );
            return SourceOutcome::timed_out(source, timeout_ms, duration_ms);
        }
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match joined {
        Ok((sink, Ok(()))) => {
            debug!(
                target: "audiosearch.runner",
                source,
                count = sink.len(),
                rejected = sink.rejected(),
                duration_ms,
                "adapter finished"
            );
            SourceOutcome::success(source, sink.into_listings(), duration_ms)
        }
        Ok((sink, Err(err))) => {
            let failure = SourceFailure::from(&err);
            warn!(
                target: "audiosearch.runner",
                source,
                code = %failure.code,
                collected = sink.len(),
                duration_ms,
                "adapter failed: {}",
                err
            );
            if sink.is_empty() {
                SourceOutcome::failed(source, failure, duration_ms)
            } else {
                SourceOutcome::partial(source, sink.into_listings(), failure, duration_ms)
            }
        }
        Err(err) => crashed(source, err, duration_ms),
    }
}

/// Outcome for a task that panicked or was cancelled by runtime shutdown.
pub(super) fn crashed(source: &'static str, err: JoinError, duration_ms: u64) -> SourceOutcome {
    let failure = if err.is_panic() {
        let payload = err.into_panic();
        SourceFailure::panicked(format!("adapter panicked: {}", panic_message(&*payload)))
    } else {
        SourceFailure::new("cancelled", "adapter task was cancelled")
    };
    warn!(
        target: "audiosearch.runner",
        source,
        code = %failure.code,
        "{}",
        failure.message
    );
    SourceOutcome::failed(source, failure, duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::listing::Listing;
    use crate::search::SourceStatus;
    use async_trait::async_trait;

    /// Pushes `pages` listings, then optionally fails or stalls.
    struct Scripted {
        pages: usize,
        then: Then,
    }

    enum Then {
        Finish,
        Fail,
        Stall,
        Block,
        Panic,
    }

    #[async_trait]
    impl Adapter for Scripted {
        fn id(&self) -> &'static str {
            "scripted"
        }
        fn display_name(&self) -> &'static str {
            "Scripted"
        }
        fn description(&self) -> &'static str {
            "runner test adapter"
        }
        async fn search(
            &self,
            _query: &AdapterQuery,
            sink: &mut ListingSink,
        ) -> Result<(), AdapterError> {
            for page in 0..self.pages {
                sink.push(Listing::new(
                    "scripted",
                    format!("item {page}"),
                    format!("https://s/{page}"),
                ));
            }
            match self.then {
                Then::Finish => Ok(()),
                Then::Fail => Err(AdapterError::Status {
                    status: 503,
                    url: "https://s/page/2".into(),
                }),
                Then::Stall => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
                Then::Block => {
                    std::thread::sleep(Duration::from_secs(2));
                    Ok(())
                }
                Then::Panic => panic!("selector blew up"),
            }
        }
    }

    fn query() -> Arc<AdapterQuery> {
        Arc::new(AdapterQuery::new(vec!["amp".into()]))
    }

    fn scripted(pages: usize, then: Then) -> Arc<dyn Adapter> {
        Arc::new(Scripted { pages, then })
    }

    #[tokio::test]
    async fn test_success() {
        let adapter = scripted(2, Then::Finish);
        let outcome = run(adapter, query(), Duration::from_secs(5)).await;
        assert_eq!(outcome.status(), SourceStatus::Success);
        assert_eq!(outcome.listings().len(), 2);
        assert!(outcome.error().is_none());
    }

    #[tokio::test]
    async fn test_error_without_listings_is_failed() {
        let adapter = scripted(0, Then::Fail);
        let outcome = run(adapter, query(), Duration::from_secs(5)).await;
        assert_eq!(outcome.status(), SourceStatus::Failed);
        assert_eq!(outcome.error().unwrap().code, "http_status");
    }

    #[tokio::test]
    async fn test_error_after_listings_is_partial() {
        let adapter = scripted(3, Then::Fail);
        let outcome = run(adapter, query(), Duration::from_secs(5)).await;
        assert_eq!(outcome.status(), SourceStatus::PartialFailure);
        assert_eq!(outcome.listings().len(), 3);
        assert!(outcome.error().is_some());
    }

    #[tokio::test]
    async fn test_timeout_discards_listings() {
        let adapter = scripted(2, Then::Stall);
        let start = Instant::now();
        let outcome = run(adapter, query(), Duration::from_millis(50)).await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.status(), SourceStatus::TimedOut);
        assert!(outcome.listings().is_empty());
        assert_eq!(outcome.error().unwrap().code, "timeout");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_holds_when_adapter_blocks_its_thread() {
        let adapter = scripted(1, Then::Block);
        let start = Instant::now();
        let outcome = run(adapter, query(), Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_secs(1), "took {:?}", start.elapsed());
        assert_eq!(outcome.status(), SourceStatus::TimedOut);
        assert!(outcome.listings().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_failed_with_panic_code() {
        let adapter = scripted(1, Then::Panic);
        let outcome = run(adapter, query(), Duration::from_secs(5)).await;
        assert_eq!(outcome.status(), SourceStatus::Failed);
        assert!(outcome.listings().is_empty());
        let failure = outcome.error().unwrap();
        assert_eq!(failure.code, "panic");
        assert!(failure.message.contains("selector blew up"));
    }
}
