//! Clients for services the bot pulls track data from.

pub mod resolver;

pub use resolver::{ResolvedTrack, ResolverClient, ResolverClientError};
