//! Indexed datasets: wire codec, merging, subsetting

pub mod frame;
pub mod legacy;
pub mod merge;
pub mod subset;

pub use frame::{FrameError, IndexedFrame, DEFAULT_INDEX_NAMES, FALLBACK_INDEX_NAMES};
pub use legacy::with_legacy_index_names;
pub use merge::{distinct_names, merge, MergeError};
pub use subset::{subset, DateRange};
