//! Manual check-ins and the time they occupy.

pub mod attribution;
pub mod breakdown;
pub mod model;

pub use attribution::attribute;
pub use breakdown::Breakdown;
pub use model::{DurationSegment, Impact};
