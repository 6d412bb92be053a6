//! Discord-facing presentation: embeds and channel notices.

pub mod announcer;
pub mod embeds;
