//! Raw response → Ready / Pending / Failed.

use tracing::debug;

use super::error::{RetrievalError, PENDING_STATUS};
use crate::data::IndexedFrame;

/// Status and body of one remote response, exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Classified result for one source path.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Ready { path: String, frame: IndexedFrame },
    Pending { path: String },
    Failed(RetrievalError),
}

impl SourceOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, SourceOutcome::Ready { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SourceOutcome::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed(_))
    }
}

/// Classify a response for `path`.
///
/// 200 with a decodable body is Ready; 202 is Pending and the body is
/// ignored; anything else fails with the upstream status. A 200 whose body
/// does not decode fails as a deserialization error.
pub fn classify(path: &str, raw: RawResponse) -> SourceOutcome {
    match raw.status {
        200 => match IndexedFrame::from_parquet_bytes(&raw.body) {
            Ok(frame) => SourceOutcome::Ready {
                path: path.to_string(),
                frame,
            },
            Err(e) => {
                debug!(path, error = %e, "failed to deserialize response body");
                SourceOutcome::Failed(RetrievalError::Deserialization {
                    path: path.to_string(),
                    reason: e.to_string(),
                })
            }
        },
        PENDING_STATUS => SourceOutcome::Pending {
            path: path.to_string(),
        },
        status => SourceOutcome::Failed(RetrievalError::transport(path, status, &raw.body)),
    }
}
