//! Rapport Core: shared types, the error taxonomy, configuration and the
//! observable-value capability used across the Rapport trust layer.

pub mod config;
pub mod error;
pub mod observable;
pub mod telemetry;
pub mod types;

pub use config::{CacheConfig, KdfConfig, LoggingConfig, RapportConfig, SyncConfig};
pub use error::TrustError;
pub use observable::{Observable, ObservableValue, Subscription};
pub use types::{ContactStatus, DirtyFields, DiscoveryEvent, SyncField};
