//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay steps produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) is attached to the tower-http trace span
//! - Metrics are cheap (atomic increments) and off unless configured

pub mod logging;
pub mod metrics;
