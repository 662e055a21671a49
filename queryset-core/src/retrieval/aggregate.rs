//! Fold classified source outcomes into one retrieval outcome.
//!
//! Priority is failed > pending > ready. Every failure is kept, not just the
//! first. Pending is never downgraded to a partial dataset.

use tracing::{info, warn};

use super::classify::SourceOutcome;
use super::error::{default_messages, render_messages, RetrievalError, PENDING_STATUS};
use crate::data::{merge, IndexedFrame};

/// All failures of one retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    errors: Vec<RetrievalError>,
}

impl ErrorReport {
    pub fn new(errors: Vec<RetrievalError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[RetrievalError] {
        &self.errors
    }

    /// The most severe (highest) individual status.
    pub fn status(&self) -> u16 {
        self.errors
            .iter()
            .map(RetrievalError::status)
            .max()
            .unwrap_or(500)
    }

    /// Every individual message, one per line.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Message plus the canned hints for the aggregate status.
    pub fn render(&self) -> String {
        let hints = render_messages(&default_messages(self.status()));
        if hints.is_empty() {
            self.message()
        } else {
            format!("{}\n\n{hints}", self.message())
        }
    }
}

/// The single result of retrieving a queryset.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    Ready(IndexedFrame),
    Pending { paths: Vec<String> },
    Failed(ErrorReport),
}

impl RetrievalOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, RetrievalOutcome::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RetrievalOutcome::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RetrievalOutcome::Failed(_))
    }

    pub fn status(&self) -> u16 {
        match self {
            RetrievalOutcome::Ready(_) => 200,
            RetrievalOutcome::Pending { .. } => PENDING_STATUS,
            RetrievalOutcome::Failed(report) => report.status(),
        }
    }

    /// Status code and body suitable for handing straight back to a client.
    ///
    /// Ready is gzip-compressed parquet. Pending and failures are text.
    pub fn into_response(self) -> (u16, Vec<u8>) {
        match self {
            RetrievalOutcome::Ready(frame) => match frame.to_parquet_bytes() {
                Ok(bytes) => (200, bytes),
                Err(e) => (500, format!("failed to encode dataset: {e}").into_bytes()),
            },
            RetrievalOutcome::Pending { .. } => (
                PENDING_STATUS,
                render_messages(&default_messages(PENDING_STATUS)).into_bytes(),
            ),
            RetrievalOutcome::Failed(report) => (report.status(), report.render().into_bytes()),
        }
    }
}

/// Combine per-source outcomes; merge only when every source is ready.
pub fn aggregate(outcomes: Vec<SourceOutcome>) -> RetrievalOutcome {
    let total = outcomes.len();
    let mut frames = Vec::with_capacity(total);
    let mut pending = Vec::new();
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome {
            SourceOutcome::Ready { frame, .. } => frames.push(frame),
            SourceOutcome::Pending { path } => pending.push(path),
            SourceOutcome::Failed(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        warn!(
            failed = errors.len(),
            pending = pending.len(),
            total,
            "retrieval failed"
        );
        return RetrievalOutcome::Failed(ErrorReport::new(errors));
    }

    if !pending.is_empty() {
        info!(pending = pending.len(), total, "retrieval pending");
        return RetrievalOutcome::Pending { paths: pending };
    }

    match merge(frames) {
        Ok(frame) => {
            info!(rows = frame.height(), sources = total, "merged datasets");
            RetrievalOutcome::Ready(frame)
        }
        Err(e) => {
            warn!(error = %e, "merge failed");
            RetrievalOutcome::Failed(ErrorReport::new(vec![RetrievalError::Merge(e)]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MergeError;
    use polars::prelude::*;

    fn ready(path: &str, column: &str) -> SourceOutcome {
        let df = DataFrame::new(vec![
            Column::new(column.into(), vec![1.0, 2.0]),
            Column::new("t".into(), vec![1i64, 2]),
            Column::new("u".into(), vec![1i64, 1]),
        ])
        .unwrap();
        SourceOutcome::Ready {
            path: path.into(),
            frame: IndexedFrame::new(df, "t", "u").unwrap(),
        }
    }

    fn pending(path: &str) -> SourceOutcome {
        SourceOutcome::Pending { path: path.into() }
    }

    fn failed(path: &str, status: u16) -> SourceOutcome {
        SourceOutcome::Failed(RetrievalError::transport(path, status, b"boom"))
    }

    #[test]
    fn all_ready_merges() {
        let outcome = aggregate(vec![ready("a", "x"), ready("b", "y")]);
        match outcome {
            RetrievalOutcome::Ready(frame) => assert_eq!(frame.data_columns(), vec!["x", "y"]),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn pending_beats_ready() {
        let outcome = aggregate(vec![ready("a", "x"), pending("b"), ready("c", "z")]);
        match outcome {
            RetrievalOutcome::Pending { paths } => assert_eq!(paths, vec!["b".to_string()]),
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[test]
    fn failure_beats_pending() {
        let outcome = aggregate(vec![failed("a", 500), pending("b"), ready("c", "z")]);
        assert!(outcome.is_failed());
        assert_eq!(outcome.status(), 500);
    }

    #[test]
    fn all_failures_reported_with_max_status() {
        let outcome = aggregate(vec![failed("a", 404), failed("b", 503), failed("c", 500)]);
        match outcome {
            RetrievalOutcome::Failed(report) => {
                assert_eq!(report.errors().len(), 3);
                assert_eq!(report.status(), 503);
                let message = report.message();
                for path in ["a", "b", "c"] {
                    assert!(message.contains(&format!("{path} returned")));
                }
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn merge_failure_is_500() {
        let outcome = aggregate(vec![]);
        match outcome {
            RetrievalOutcome::Failed(report) => {
                assert_eq!(report.status(), 500);
                assert_eq!(
                    report.errors(),
                    &[RetrievalError::Merge(MergeError::NoInputs)]
                );
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn responses() {
        let (status, body) = aggregate(vec![pending("a")]).into_response();
        assert_eq!(status, 202);
        assert!(String::from_utf8(body).unwrap().contains("pending"));

        let (status, body) = aggregate(vec![failed("a", 502)]).into_response();
        assert_eq!(status, 502);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("a returned 502"));
        assert!(text.contains("hint: Tell an admin!"));

        let (status, body) = aggregate(vec![ready("a", "x")]).into_response();
        assert_eq!(status, 200);
        assert!(IndexedFrame::from_parquet_bytes(&body).is_ok());
    }
}
