//! Integration test root.
//!
//! Every scenario drives the real client against a scripted WebSocket
//! feed server bound to an ephemeral local port, so the production
//! transport path is exercised end to end.

mod feed_tests;
