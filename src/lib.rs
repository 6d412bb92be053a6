//! Discord music bot split into two processes: the bot front-end
//! ([`bot`], [`audio`]) and an HTTP resolver service ([`resolver`]) that
//! turns play queries into streamable audio URLs with yt-dlp.

pub mod audio;
pub mod bot;
pub mod config;
pub mod protocol;
pub mod resolver;
pub mod sources;
pub mod ui;
