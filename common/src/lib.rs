//! Shared value types for the feed workspace.
//!
//! This crate contains pure data structures passed between layers. No
//! business logic lives here - just data.
//!
//! ## Architecture
//!
//! - **common** (this crate): Pure value types
//! - **feed-core**: The client library operating on them
//! - **feedwatch**: Application wiring everything together
//!
//! This layered architecture keeps concerns separated and makes testing easier.

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
