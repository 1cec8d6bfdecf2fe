//! HTML parsing off the async workers.
//!
//! Building a DOM for a results page is CPU work. Adapters hand the page body
//! to `parse_off_thread` and await the parsed value while a small rayon pool
//! does the work.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use once_cell::sync::Lazy;
use rayon::ThreadPool;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::error::{panic_message, AdapterError};

static PARSE_THREADS: Lazy<usize> = Lazy::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(2)
        .clamp(1, 4)
});

/// `None` if the pool could not be built; parsing then uses tokio's
/// blocking threads instead.
static PARSE_POOL: Lazy<Option<ThreadPool>> = Lazy::new(|| {
    rayon::ThreadPoolBuilder::new()
        .num_threads(*PARSE_THREADS)
        .thread_name(|idx| format!("audiosearch-html-{idx}"))
        .build()
        .map_err(|err| {
            warn!(target: "audiosearch.adapter", error = %err, "html parse pool unavailable");
        })
        .ok()
});

/// Threads in the parse pool.
pub fn parse_threads() -> usize {
    *PARSE_THREADS
}

/// Run `parser` over `html` on the parse pool and return what it builds.
///
/// `source` names the adapter in logs and errors. A panicking parser turns
/// into `AdapterError::Parse` for that source only.
pub async fn parse_off_thread<T, F>(
    source: &'static str,
    html: String,
    parser: F,
) -> Result<T, AdapterError>
where
    F: FnOnce(&str) -> T + Send + 'static,
    T: Send + 'static,
{
    let job = move || {
        let started = Instant::now();
        let parsed = catch_unwind(AssertUnwindSafe(|| parser(&html)));
        trace!(
            target: "audiosearch.adapter",
            source,
            bytes = html.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page parsed"
        );
        parsed
    };

    let parsed = match PARSE_POOL.as_ref() {
        Some(pool) => {
            let (tx, rx) = oneshot::channel();
            pool.spawn(move || {
                // The receiver is gone once the adapter task was aborted.
                let _ = tx.send(job());
            });
            rx.await
                .map_err(|_| AdapterError::Other(format!("{source}: parse job was dropped")))?
        }
        None => tokio::task::spawn_blocking(job)
            .await
            .map_err(|err| AdapterError::Other(format!("{source}: parse task failed: {err}")))?,
    };

    parsed.map_err(|payload| {
        AdapterError::Parse(format!(
            "{source} parser panicked: {}",
            panic_message(&*payload)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parser_runs_on_pool_thread() {
        let (len, thread) = parse_off_thread("test", "<ul></ul>".to_string(), |html| {
            (html.len(), std::thread::current().name().map(str::to_string))
        })
        .await
        .unwrap();

        assert_eq!(len, 9);
        assert!(thread.unwrap_or_default().starts_with("audiosearch-html-"));
        assert!(parse_threads() >= 1);
    }

    #[tokio::test]
    async fn test_parser_panic_becomes_parse_error() {
        let err = parse_off_thread("taktoton", String::new(), |_| -> usize {
            panic!("bad markup")
        })
        .await
        .unwrap_err();

        assert_eq!(err.code_str(), "parse_error");
        assert!(err.to_string().contains("taktoton parser panicked: bad markup"));
    }
}
