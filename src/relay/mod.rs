//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound GET ?url=...&headers=...
//!     → target.rs (parse and validate the upstream URL)
//!     → overrides.rs (decode the headers JSON blob)
//!     → session.rs (look up the cookie jar for the host)
//!     → headers.rs (compose the browser-shaped upstream header set)
//!     → transport.rs (fetch, per-request TLS policy)
//!     → session.rs (absorb Set-Cookie)
//!     → classify.rs (playlist, binary or possible error page)
//!         → playlist.rs (rewrite references back through the relay)
//!         → peek.rs (inspect the head of suspicious bodies)
//!     → orchestrator.rs (one response per request)
//! ```
//!
//! # Design Decisions
//! - The session store is the only state shared across requests
//! - Media bodies are streamed, never buffered; only playlists and the
//!   peeked head of suspicious responses are held in memory

pub mod classify;
pub mod headers;
pub mod orchestrator;
pub mod overrides;
pub mod peek;
pub mod playlist;
pub mod session;
pub mod target;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::Classification;
pub use headers::{EffectiveRequestHeaders, HeaderComposer};
pub use orchestrator::{Relay, RelayQuery, RelayResponse};
pub use overrides::HeaderOverrides;
pub use playlist::PlaylistRewriter;
pub use session::SessionStore;
pub use target::UpstreamTarget;
pub use transport::{ReqwestTransport, TlsPolicy, TransportError, TransportKind, UpstreamTransport};
