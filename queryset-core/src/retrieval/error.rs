//! Per-source retrieval failures and the hint messages attached to responses.

use thiserror::Error;

use crate::data::MergeError;

/// Status reported for bodies that arrived with 200 but could not be decoded.
pub const DESERIALIZATION_STATUS: u16 = 500;

/// Status reported when individually valid datasets cannot be joined.
pub const MERGE_STATUS: u16 = 500;

/// Status for a source that answered "not yet materialized".
pub const PENDING_STATUS: u16 = 202;

/// Status used for connection-level failures (no HTTP response at all).
pub const BAD_GATEWAY_STATUS: u16 = 502;

/// One source's failure. Collected as data, never raised across the fetch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("{path} returned {status} ({body})")]
    Transport {
        path: String,
        status: u16,
        body: String,
    },

    #[error("could not deserialize data from {path}: {reason}")]
    Deserialization { path: String, reason: String },

    #[error("could not subset data from {path}: {reason}")]
    Subset { path: String, reason: String },

    #[error("failed to merge datasets: {0}")]
    Merge(#[from] MergeError),
}

impl RetrievalError {
    pub fn transport(path: impl Into<String>, status: u16, body: &[u8]) -> Self {
        RetrievalError::Transport {
            path: path.into(),
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RetrievalError::Transport { status, .. } => *status,
            RetrievalError::Deserialization { .. } | RetrievalError::Subset { .. } => {
                DESERIALIZATION_STATUS
            }
            RetrievalError::Merge(_) => MERGE_STATUS,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            RetrievalError::Transport { path, .. }
            | RetrievalError::Deserialization { path, .. }
            | RetrievalError::Subset { path, .. } => Some(path),
            RetrievalError::Merge(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Message,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub content: &'static str,
}

const TELL_AN_ADMIN: Message = Message {
    kind: MessageKind::Hint,
    content: "Tell an admin! If you requested a queryset when receiving this error, \
              include it in your error report.",
};

/// Canned explanation for a response status, if there is one.
pub fn default_messages(status: u16) -> Vec<Message> {
    match status {
        502 => vec![
            Message {
                kind: MessageKind::Message,
                content: "Queryset manager didn't manage to reach an upstream resource.",
            },
            TELL_AN_ADMIN,
        ],
        500 => vec![
            Message {
                kind: MessageKind::Message,
                content: "Something went wrong upstream. Queryset manager received a 500 \
                          error without any further information.",
            },
            TELL_AN_ADMIN,
        ],
        202 => vec![
            Message {
                kind: MessageKind::Message,
                content: "The requested resource was pending.",
            },
            Message {
                kind: MessageKind::Hint,
                content: "Try again later.",
            },
        ],
        _ => Vec::new(),
    }
}

/// Render canned messages, one per line, hints prefixed.
pub fn render_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| match m.kind {
            MessageKind::Message => m.content.to_string(),
            MessageKind::Hint => format!("hint: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(RetrievalError::transport("p", 404, b"nope").status(), 404);
        assert_eq!(
            RetrievalError::Deserialization {
                path: "p".into(),
                reason: "r".into()
            }
            .status(),
            500
        );
        assert_eq!(RetrievalError::Merge(MergeError::NoInputs).status(), 500);
    }

    #[test]
    fn transport_message_contains_body() {
        let e = RetrievalError::transport("a/b", 500, b"something went wrong");
        assert_eq!(e.to_string(), "a/b returned 500 (something went wrong)");
    }

    #[test]
    fn pending_messages_hint_retry() {
        let text = render_messages(&default_messages(202));
        assert!(text.contains("hint: Try again later."));
        assert!(default_messages(418).is_empty());
    }
}
