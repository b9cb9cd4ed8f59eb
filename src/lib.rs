//! M3U8 relay library.
//!
//! An HTTP relay that fetches HLS playlists and segments on behalf of
//! browser players, presenting browser-like headers upstream and rewriting
//! playlists so every follow-up request routes back through the relay.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod security;

pub use config::schema::RelayConfig;
pub use error::RelayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{Relay, RelayQuery, RelayResponse, SessionStore};
