//! Filesystem-backed build cache with a throttled remote mirror.
//!
//! Records live under `<root>/<schema>/<group>/<artifact>/<fingerprint>/`.
//! Records downloaded from the remote store sit directly in that directory
//! next to a lookup marker that throttles repeated remote misses; records
//! produced locally go to its `local/` subdirectory. Only a bounded number of
//! fingerprint directories is retained per project.

#![warn(missing_docs)]

pub mod error;
pub mod eviction;
pub mod layout;
pub mod local;
pub mod remote;
pub mod throttle;

pub use error::StoreError;
pub use layout::CacheLayout;
pub use local::{ArtifactFile, LocalStore, StoreSettings};
pub use remote::RemoteCache;
