//! Passive tracking stream: parsing an export, naming and coloring events, and removing
//! duplicate captures.

pub mod color;
pub mod import;
pub mod model;
pub mod normalizer;
pub mod payload;

pub use import::{parse_export, ImportError, ImportedBucket};
pub use model::{BucketType, NormalizedEvent, RawEvent};
pub use normalizer::{dedup, normalize, NormalizeOptions};
