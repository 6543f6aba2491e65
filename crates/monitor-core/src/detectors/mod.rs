mod decline;
mod drop;

pub use decline::{DeclineDetector, DEFAULT_CONSECUTIVE_DAYS};
pub use drop::{DropDetector, DEFAULT_DROP_THRESHOLD};
