pub mod config;
pub mod error;
pub mod types;

pub use config::{PscConfig, RetentionConfig};
pub use error::{PscError, PscResult};
pub use types::{MediumKind, RetentionPolicy, RetentionRule, SameSite};
