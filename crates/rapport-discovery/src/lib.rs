//! Rapport Discovery Layer
//!
//! - Publish/resolve transport contract and an HTTP implementation
//! - Offline-tolerant sync wrapper with persisted dirty flags
//! - Stale-while-revalidate graph cache for remote participants

pub mod cache_store;
pub mod graph_cache;
pub mod http;
pub mod offline;
pub mod sync_state;
pub mod transport;

pub use cache_store::{CachedGraphDetails, CachedGraphEntry, GraphCacheStore, MemoryGraphCacheStore};
pub use graph_cache::GraphCacheService;
pub use http::HttpDiscovery;
pub use offline::{CurrentData, OfflineDiscovery, ResolvedProfile, SyncReport};
pub use sync_state::{MemorySyncStateStore, SyncStateStore};
pub use transport::{AttestationSet, DiscoveryAdapter, ProfileSummary, VerificationSet};
