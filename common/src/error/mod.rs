//! Error support types shared by every workspace crate.

pub mod error_location;
