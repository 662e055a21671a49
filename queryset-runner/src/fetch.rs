//! Concurrent fan-out of one request per path.
//!
//! Every path in a batch is requested independently on a private rayon
//! pool. Results come back in input order. A failing request never stops
//! its siblings: upstream failures are ordinary responses, and the only
//! whole-batch outcomes are cancellation and an expired deadline. Both are
//! noticed while waiting, so the batch returns without waiting for slow
//! requests, which finish detached and are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use queryset_core::retrieval::{RawResponse, BAD_GATEWAY_STATUS};

use crate::config::DEFAULT_MAX_IN_FLIGHT;
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("retrieval was cancelled")]
    Cancelled,

    #[error("retrieval deadline exceeded")]
    DeadlineExceeded,

    #[error("failed to build fetch pool: {0}")]
    Pool(String),
}

/// Deadline and cancellation token for one batch.
#[derive(Debug, Clone, Default)]
pub struct FetchControl {
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl FetchControl {
    /// No deadline, not cancellable.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort the batch once `cancel` is set.
    pub fn cancel_token(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

/// Ask for the data, or only ask the remote to materialize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Data,
    Touch,
}

/// Why one request produced no response.
enum Interrupted {
    Cancelled,
    TimedOut,
}

/// Issues one request per path against `base_url` through a transport.
pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    base_url: String,
    max_in_flight: usize,
}

impl FetchOrchestrator {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap on concurrent requests; at least one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `path`, with the touch flag in touch mode.
    pub fn url_for(&self, path: &str, mode: FetchMode) -> String {
        let base = self.base_url.trim_end_matches('/');
        match mode {
            FetchMode::Data => format!("{base}/{path}"),
            FetchMode::Touch => format!("{base}/{path}?touch=true"),
        }
    }

    /// Request every path; one response per path, in input order.
    pub fn fetch_all(
        &self,
        paths: &[String],
        mode: FetchMode,
        control: &FetchControl,
    ) -> Result<Vec<RawResponse>, FetchError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        if control.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if control.is_expired() {
            return Err(FetchError::DeadlineExceeded);
        }

        let workers = paths.len().min(self.max_in_flight);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("queryset-fetch-{i}"))
            .build()
            .map_err(|e| FetchError::Pool(e.to_string()))?;

        let started = Instant::now();
        let (tx, rx) = mpsc::channel();
        for (index, path) in paths.iter().enumerate() {
            let tx = tx.clone();
            let transport = Arc::clone(&self.transport);
            let url = self.url_for(path, mode);
            let path = path.clone();
            let control = control.clone();
            pool.spawn(move || {
                let result = fetch_one(transport.as_ref(), &path, &url, &control);
                // The receiver is gone once the batch has been abandoned.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<RawResponse>> = (0..paths.len()).map(|_| None).collect();
        let mut received = 0;
        while received < paths.len() {
            if control.is_cancelled() {
                return Err(abandon(FetchError::Cancelled, paths.len() - received));
            }
            if control.is_expired() {
                return Err(abandon(FetchError::DeadlineExceeded, paths.len() - received));
            }

            let wait = control
                .remaining()
                .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
            match rx.recv_timeout(wait) {
                Ok((index, Ok(raw))) => {
                    slots[index] = Some(raw);
                    received += 1;
                }
                Ok((_, Err(Interrupted::Cancelled))) => {
                    return Err(abandon(FetchError::Cancelled, paths.len() - received));
                }
                Ok((_, Err(Interrupted::TimedOut))) => {
                    return Err(abandon(FetchError::DeadlineExceeded, paths.len() - received));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FetchError::Pool(
                        "fetch worker exited without a result".to_string(),
                    ));
                }
            }
        }

        info!(
            paths = paths.len(),
            workers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?mode,
            "fetched batch"
        );
        Ok(slots.into_iter().flatten().collect())
    }
}

/// How often a waiting batch re-checks its cancel token and deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn abandon(error: FetchError, outstanding: usize) -> FetchError {
    warn!(outstanding, %error, "abandoning fetch batch");
    error
}

fn fetch_one(
    transport: &dyn Transport,
    path: &str,
    url: &str,
    control: &FetchControl,
) -> Result<RawResponse, Interrupted> {
    if control.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }
    let timeout = control.remaining();
    if timeout.is_some_and(|left| left.is_zero()) {
        return Err(Interrupted::TimedOut);
    }

    match transport.get(url, timeout) {
        Ok(raw) => {
            debug!(path, status = raw.status, bytes = raw.body.len(), "fetched");
            Ok(raw)
        }
        Err(TransportError::Timeout(_)) => {
            debug!(path, "request timed out");
            Err(Interrupted::TimedOut)
        }
        Err(e) => Ok(RawResponse::new(BAD_GATEWAY_STATUS, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Transport for Echo {
        fn get(&self, url: &str, _: Option<Duration>) -> Result<RawResponse, TransportError> {
            Ok(RawResponse::new(200, url.as_bytes().to_vec()))
        }
    }

    fn orchestrator() -> FetchOrchestrator {
        FetchOrchestrator::new(Arc::new(Echo), "http://source/data/")
    }

    #[test]
    fn urls() {
        let fetcher = orchestrator();
        assert_eq!(
            fetcher.url_for("country_month/base/x/_", FetchMode::Data),
            "http://source/data/country_month/base/x/_"
        );
        assert_eq!(
            fetcher.url_for("country_month/base/x/_", FetchMode::Touch),
            "http://source/data/country_month/base/x/_?touch=true"
        );
    }

    #[test]
    fn empty_batch_makes_no_pool() {
        let out = orchestrator()
            .fetch_all(&[], FetchMode::Data, &FetchControl::unbounded())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn control_state() {
        assert!(!FetchControl::unbounded().is_expired());
        assert_eq!(FetchControl::unbounded().remaining(), None);

        let past = FetchControl::unbounded().deadline(Instant::now());
        assert!(past.is_expired());

        let flag = Arc::new(AtomicBool::new(false));
        let control = FetchControl::with_timeout(Duration::from_secs(60)).cancel_token(flag.clone());
        assert!(!control.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(control.is_cancelled());
    }

    #[test]
    fn pre_cancelled_batch_is_rejected() {
        let control = FetchControl::unbounded().cancel_token(Arc::new(AtomicBool::new(true)));
        let err = orchestrator()
            .fetch_all(&["a".into()], FetchMode::Data, &control)
            .unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
    }
}
