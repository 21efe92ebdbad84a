//! psc-storage: the places a session blob can live
//!
//! Every medium is a small named-entry store behind [`StorageMedium`], so the
//! session cache holds no ambient global state and tests can use in-memory
//! media. The two concrete media mirror what a browser offers:
//!   - [`CookieJar`]: cookie semantics (path, `Secure`, `SameSite`, expiry, size cap)
//!   - [`SessionStore`]: session-scoped storage that ends with the browsing context
//!
//! Both run purely in memory or backed by a JSON file (written via temp + rename).

pub mod cookie;
pub mod medium;
mod persist;
pub mod session_store;

pub use cookie::{Cookie, CookieAttributes, CookieJar};
pub use medium::StorageMedium;
pub use session_store::SessionStore;
