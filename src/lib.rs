//! Personal activity analytics: turns passively captured activity into a timeline of fixed
//! blocks, attributes manual check-ins to days and goals, and materializes tasks of recurring
//! routines on a schedule.

pub mod cli;
pub mod daemon;
pub mod events;
pub mod impacts;
pub mod routines;
pub mod timeline;
pub mod utils;
