//! Worth the Watch? backend and status client.
//!
//! The server side turns scattered critic reviews and Reddit threads into a
//! single consensus review per title, generated in the background and
//! observable over SSE or polling. The [`client`] module is the matching
//! consumer used by the `review-watch` binary.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
