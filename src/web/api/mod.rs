//! API endpoints module.

pub mod inbox;

pub use inbox::{inbox_stats, post_inbox};
