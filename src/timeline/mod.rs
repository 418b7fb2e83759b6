//! Day timeline built from normalized events: fixed blocks with a dominant activity each, then
//! merged into runs.

pub mod blocks;
pub mod merge;

pub use blocks::{chunk, BlockOptions, BlockSize, DayBounds, TimeBlock};
pub use merge::merge;
