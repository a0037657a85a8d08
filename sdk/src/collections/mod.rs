//! Bounded and reconciled collections used by feed state.

pub mod merge;
pub mod ring;
pub mod ttl;

pub use merge::{compose_unread, merge_by_key, Identified, MergeOrder, MergedCollection};
pub use ring::RingBuffer;
pub use ttl::TtlMap;
