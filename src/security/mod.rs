//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (origin allow-list, before any upstream fetch)
//!     → [relay]
//!     → headers.rs (CORS, cache and nosniff headers on every response)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an enforced allow-list rejects requests without `Origin`
//! - The relay has no authentication; the allow-list is the only gate

pub mod access_control;
pub mod headers;

pub use access_control::OriginPolicy;
