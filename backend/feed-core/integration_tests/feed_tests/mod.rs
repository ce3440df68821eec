pub mod helpers;

mod client;
