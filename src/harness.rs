//! Test wrappers composed at the call site.
//!
//! Each wrapper observes a test body, then either passes its result through
//! or converts it into a uniform failure:
//!
//! ```rust,ignore
//! log_test_execution("get_user", async {
//!     let response = within_time_budget(Duration::from_secs(2), client.get("/users/1")).await??;
//!     assert_status_code(&response, 200)?;
//!     Ok::<_, api_testkit::Error>(())
//! })
//! .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::assertions::{assert_elapsed, AssertionFailure};
use crate::error::{Error, Result};

/// Log the start of `name`, then its outcome and elapsed time.
pub async fn log_test_execution<F, T, E>(name: &str, test: F) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    tracing::info!(test = %name, "Starting test");
    let started = Instant::now();
    let result = test.await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(_) => tracing::info!(test = %name, elapsed_ms, "Test passed"),
        Err(e) => tracing::error!(test = %name, elapsed_ms, error = %e, "Test failed"),
    }
    result
}

/// Run `test` to completion and fail if it took longer than `max`.
///
/// The future is not cancelled on overrun; use the per-request timeout for a
/// hard deadline.
pub async fn within_time_budget<F, T>(max: Duration, test: F) -> std::result::Result<T, AssertionFailure>
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let output = test.await;
    let elapsed = started.elapsed();
    tracing::info!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Measured execution time");
    assert_elapsed(elapsed, max)?;
    Ok(output)
}

/// Re-run `test` up to `tries` times in total, sleeping `delay` before the
/// first retry and multiplying it by `backoff` after each.
pub async fn retry_on_failure<F, Fut, T, E>(
    tries: u32,
    delay: Duration,
    backoff: f64,
    mut test: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let tries = tries.max(1);
    let mut delay = delay;
    let mut attempt = 1;

    loop {
        match test().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < tries => {
                tracing::warn!(
                    attempt,
                    tries,
                    delay = ?delay,
                    error = %e,
                    "Test attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(backoff.max(0.0));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Timing summary of a [`performance_sample`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub samples: Vec<Duration>,
    pub percentile: u8,
    pub percentile_time: Duration,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl PerformanceReport {
    fn from_samples(mut samples: Vec<Duration>, percentile: u8) -> Self {
        samples.sort();
        let count = samples.len();
        let index = (count * usize::from(percentile) / 100).min(count.saturating_sub(1));
        let total: Duration = samples.iter().sum();

        Self {
            percentile,
            percentile_time: samples.get(index).copied().unwrap_or_default(),
            average: total / count.max(1) as u32,
            min: samples.first().copied().unwrap_or_default(),
            max: samples.last().copied().unwrap_or_default(),
            samples,
        }
    }
}

/// Run `test` `iterations` times and fail if the chosen percentile of the
/// wall-clock durations exceeds `max`. The first failing run aborts the sample.
pub async fn performance_sample<F, Fut, T>(
    iterations: usize,
    percentile: u8,
    max: Duration,
    mut test: F,
) -> Result<PerformanceReport>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let percentile = percentile.min(100);
    let mut samples = Vec::with_capacity(iterations);

    for _ in 0..iterations.max(1) {
        let started = Instant::now();
        test().await?;
        samples.push(started.elapsed());
    }

    let report = PerformanceReport::from_samples(samples, percentile);
    tracing::info!(
        iterations = report.samples.len(),
        percentile,
        percentile_ms = report.percentile_time.as_secs_f64() * 1000.0,
        average_ms = report.average.as_secs_f64() * 1000.0,
        min_ms = report.min.as_secs_f64() * 1000.0,
        max_ms = report.max.as_secs_f64() * 1000.0,
        "Performance sample"
    );

    if report.percentile_time > max {
        let failure = AssertionFailure::new(format!(
            "{}th percentile {:.3}s exceeded limit {:.3}s",
            percentile,
            report.percentile_time.as_secs_f64(),
            max.as_secs_f64()
        ))
        .with_context("percentile_seconds", report.percentile_time.as_secs_f64())
        .with_context("average_seconds", report.average.as_secs_f64())
        .with_context("max_seconds", max.as_secs_f64());
        tracing::error!(error = %failure, "Performance budget exceeded");
        return Err(Error::Assertion(failure));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_log_passes_result_through() {
        let ok: std::result::Result<u8, String> = log_test_execution("ok", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: std::result::Result<u8, String> =
            log_test_execution("err", async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_time_budget() {
        let value = within_time_budget(Duration::from_secs(5), async { 42 }).await;
        assert_eq!(value.unwrap(), 42);

        let err = within_time_budget(Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
        })
        .await
        .unwrap_err();
        assert!(err.message().contains("exceeded limit"));
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_try() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_failure(3, Duration::from_millis(1), 2.0, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {n}"))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: std::result::Result<(), String> =
            retry_on_failure(2, Duration::ZERO, 2.0, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("always".to_string())
            })
            .await;
        assert_eq!(result, Err("always".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_report_percentile() {
        let samples = (1..=10).map(Duration::from_millis).collect();
        let report = PerformanceReport::from_samples(samples, 95);
        assert_eq!(report.percentile_time, Duration::from_millis(10));
        assert_eq!(report.min, Duration::from_millis(1));
        assert_eq!(report.max, Duration::from_millis(10));
        assert_eq!(report.average, Duration::from_micros(5500));

        let samples = (1..=10).map(Duration::from_millis).collect();
        let report = PerformanceReport::from_samples(samples, 50);
        assert_eq!(report.percentile_time, Duration::from_millis(6));
    }

    #[tokio::test]
    async fn test_performance_budget() {
        let report = performance_sample(5, 95, Duration::from_secs(5), || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(report.samples.len(), 5);

        let err = performance_sample(2, 95, Duration::ZERO, || async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Assertion(_)));
    }
}
