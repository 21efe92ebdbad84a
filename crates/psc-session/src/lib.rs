//! psc-session: the client-side encrypted session cache
//!
//! Lifecycle per browsing context:
//! ```text
//! Empty --save(profile, remember)--> Cached(tier)
//! Cached(tier) --save(profile, other)--> Cached(other)   (old tier evicted first)
//! Cached(_) --clear() | decode failure--> Empty
//! ```
//! No transition leaves two media holding divergent blobs: every save clears
//! all media before it writes exactly one.
//!
//! The public operations never fail. A corrupted cache and an absent cache
//! both read as `None`; [`LoadOutcome`] keeps the distinction for logs and metrics.

pub mod cache;
pub mod metrics;
pub mod selector;

pub use cache::{LoadOutcome, SessionCache};
pub use metrics::SessionMetrics;
pub use selector::{Selection, StorageSelector};
