pub mod client;
pub mod config;
pub mod error;
pub mod protocol;

#[cfg(test)]
mod tests;

pub const JSONRPC_VERSION: &str = "2.0";
pub const SUBSCRIBE_METHOD: &str = "private/subscribe";
pub const UNSUBSCRIBE_METHOD: &str = "private/unsubscribe";
pub const DEFAULT_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_SERVER_URL: &str =
    const_format::concatcp!("ws://", DEFAULT_SERVER_HOSTNAME, ":", DEFAULT_SERVER_PORT);
