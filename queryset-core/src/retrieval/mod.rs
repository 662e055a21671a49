//! Response classification and result aggregation.

pub mod aggregate;
pub mod classify;
pub mod error;

pub use aggregate::{aggregate, ErrorReport, RetrievalOutcome};
pub use classify::{classify, RawResponse, SourceOutcome};
pub use error::{
    default_messages, render_messages, Message, MessageKind, RetrievalError, BAD_GATEWAY_STATUS,
    DESERIALIZATION_STATUS, MERGE_STATUS, PENDING_STATUS,
};
