//! Bounded worker pool.
//!
//! Keeps up to `max_workers` jobs running at once; when one finishes, the
//! next queued job is started until the queue is empty. Jobs are fully
//! independent; the filesystem is their only shared state.

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::outcome::{JobResult, RunSummary};

/// Runs every job in `jobs` through `stage` with at most `max_workers`
/// concurrent tasks (a count of 0 is treated as 1).
///
/// No ordering is imposed on execution or completion. A failed or panicked
/// job is recorded as Failed and never cancels its siblings; the call
/// returns only when all jobs have completed. Each result is forwarded on
/// `progress_tx` (when given) as it arrives so the caller can print live
/// per-job lines; a dropped receiver loses the live lines, never the counts.
pub async fn run_jobs<T, F, Fut>(
    jobs: Vec<T>,
    max_workers: usize,
    progress_tx: Option<mpsc::Sender<JobResult>>,
    stage: F,
) -> RunSummary
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = JobResult> + Send + 'static,
{
    let max_workers = max_workers.max(1);
    let mut queue = jobs.into_iter();
    let mut join_set = JoinSet::new();
    let mut summary = RunSummary::default();

    loop {
        while join_set.len() < max_workers {
            let Some(job) = queue.next() else {
                break;
            };
            join_set.spawn(stage(job));
        }

        if join_set.is_empty() {
            break;
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let result = joined
            .unwrap_or_else(|err| JobResult::failed("worker task", format!("join: {err}")));

        if let Some(tx) = &progress_tx {
            let _ = tx.send(result.clone()).await;
        }
        summary.record(&result);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn run_mixed(workers: usize) -> (RunSummary, usize) {
        let calls = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<usize> = (0..20).collect();
        let counter = Arc::clone(&calls);
        let summary = run_jobs(jobs, workers, None, move |n| {
            let calls = Arc::clone(&counter);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if n % 5 == 0 {
                    JobResult::failed(format!("job{n}"), "boom")
                } else if n % 2 == 0 {
                    JobResult::skipped(format!("job{n}"), "done before")
                } else {
                    JobResult::success(format!("job{n}"))
                }
            }
        })
        .await;
        (summary, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn one_worker_and_many_workers_agree() {
        let (serial, serial_calls) = run_mixed(1).await;
        let (wide, wide_calls) = run_mixed(20).await;

        assert_eq!(serial_calls, 20, "every job runs exactly once");
        assert_eq!(wide_calls, 20);
        assert_eq!(serial.succeeded, wide.succeeded);
        assert_eq!(serial.skipped, wide.skipped);
        assert_eq!(serial.failed, wide.failed);

        assert_eq!(serial.failed, 4);
        assert_eq!(serial.skipped, 8);
        assert_eq!(serial.succeeded, 8);
    }

    #[tokio::test]
    async fn failure_does_not_cancel_siblings() {
        let (summary, calls) = run_mixed(4).await;
        assert_eq!(calls, 20);
        assert_eq!(summary.total(), 20);
        assert_eq!(summary.failed_ids.len(), 4);
        assert!(summary.failed_ids.contains(&"job0".to_string()));
    }

    #[tokio::test]
    async fn results_are_forwarded_on_the_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let collector = tokio::spawn(async move {
            let mut seen = 0usize;
            while rx.recv().await.is_some() {
                seen += 1;
            }
            seen
        });

        let jobs: Vec<i32> = (0..7).collect();
        let summary = run_jobs(jobs, 3, Some(tx), |n| async move {
            JobResult::success(format!("j{n}"))
        })
        .await;

        assert_eq!(summary.succeeded, 7);
        assert_eq!(collector.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn zero_workers_is_clamped_to_one() {
        let summary = run_jobs(vec![1], 0, None, |_| async { JobResult::success("x") }).await;
        assert_eq!(summary.succeeded, 1);
    }
}
