//! Build sessions.
//!
//! A session owns the configuration, the stores and the controller for one
//! multi-project build. Open it once before the first project, share its
//! controller across workers, and call [`CacheSession::finish`] after the
//! last project to publish the cache report.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hoard_common::ProjectId;
use hoard_config::{load_session_config, CacheConfig, CacheRules};
use hoard_store::{CacheLayout, LocalStore, RemoteCache, StoreSettings};
use hoard_transport::{create_transport, TransportOptions};

use crate::controller::CacheController;
use crate::error::CacheError;
use crate::executor::FingerprintSource;
use crate::strategy::ExecutionStrategy;

/// Where a session runs.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Root directory of the multi-project build.
    pub build_root: PathBuf,
    /// The top-level project of the build.
    pub root_project: ProjectId,
    /// Session properties, e.g. `hoard.enabled=false`.
    pub properties: BTreeMap<String, String>,
}

/// A cache-enabled build session.
pub struct CacheSession {
    id: String,
    controller: CacheController,
}

impl CacheSession {
    /// Opens a session, loading the configuration from the build root or
    /// from the file named by the session properties.
    pub fn open(
        settings: SessionSettings,
        fingerprints: Arc<dyn FingerprintSource>,
    ) -> Result<Self, CacheError> {
        let config = load_session_config(&settings.build_root, &settings.properties)?;
        Self::with_config(settings, config, fingerprints)
    }

    /// Opens a session with an already loaded configuration.
    ///
    /// Fails if the configuration rules cannot be compiled or a configured
    /// remote URL has no transport.
    pub fn with_config(
        settings: SessionSettings,
        config: CacheConfig,
        fingerprints: Arc<dyn FingerprintSource>,
    ) -> Result<Self, CacheError> {
        let rules = Arc::new(CacheRules::resolve(&config)?);
        let format = config.record_format;
        let layout = CacheLayout::new(&config.local.resolve_root(&settings.build_root), format);
        let options = TransportOptions {
            timeout: Duration::from_secs(config.remote.timeout_secs),
            headers: config.remote.headers.clone(),
        };

        let remote_transport = match config.remote.url.as_deref() {
            Some(url) if config.remote_enabled() => Some(create_transport(url, &options)?),
            _ => None,
        };
        let remote = remote_transport
            .as_ref()
            .map(|t| RemoteCache::new(Arc::clone(t), format));

        let baseline = match config.baseline.url.as_deref() {
            Some(url) => {
                let base = match &remote_transport {
                    Some(t) => Arc::clone(t),
                    None => create_transport(url, &options)?,
                };
                let report = create_transport(url, &options)?;
                Some(RemoteCache::new(base, format).with_baseline(url, report))
            }
            None => None,
        };

        let store = Arc::new(LocalStore::new(
            layout,
            StoreSettings {
                max_builds_cached: config.local.max_builds_cached,
                save_to_remote: config.save_to_remote(),
            },
            remote,
        ));

        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            session = %id,
            enabled = config.enabled,
            cache = %store.layout().root().display(),
            remote = config.remote_enabled(),
            baseline = baseline.is_some(),
            "cache session opened"
        );

        let controller = CacheController::new(
            id.clone(),
            settings.build_root,
            settings.root_project,
            rules,
            store,
            baseline,
            fingerprints,
        );
        Ok(Self { id, controller })
    }

    /// Identifier of the session, also used as the report's build id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session configuration.
    pub fn config(&self) -> &CacheConfig {
        self.controller.config()
    }

    /// The controller shared by every project of the session.
    pub fn controller(&self) -> &CacheController {
        &self.controller
    }

    /// A strategy for building projects of this session.
    pub fn strategy(&self) -> ExecutionStrategy<'_> {
        ExecutionStrategy::new(&self.controller)
    }

    /// Ends the session and writes the cache report.
    ///
    /// Returns the local path of the report, or `None` when caching is
    /// disabled or the report could not be written.
    pub fn finish(self) -> Option<PathBuf> {
        if !self.controller.enabled() {
            return None;
        }
        let report = self.controller.produce_report();
        tracing::info!(session = %self.id, "cache session finished");
        report
    }
}
