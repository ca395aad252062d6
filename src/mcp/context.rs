//! State owned by the dispatch loop.
//!
//! All mutable server state lives here and is handed to one tool call at a
//! time, so the cache and session table need no locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::cache::{CacheKey, ResultCache};
use crate::config::{Config, ScanConfig};
use crate::error::ToolError;
use crate::scan::{
    resolve_root, EntryFilter, PaginationPlan, ScanError, ScanOutcome, Scanner, SortSpec,
};
use crate::services::{
    CodeMetrics, HealthCheck, LineMetrics, MetricsReport, ProcessHealth, UsageLedger,
    UsageRecorder,
};
use crate::session::{SessionManager, StoppedSession, StreamBatch};

/// How a listing request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache.
    Hit,
    /// Scanned and stored.
    Miss,
    /// Caller asked to skip the lookup; the fresh scan was stored.
    Bypass,
    /// Caching is turned off.
    Disabled,
}

impl CacheStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
            Self::Disabled => "disabled",
        }
    }
}

/// Everything a tool handler may read or change.
pub struct ServerContext {
    allowed_paths: Vec<PathBuf>,
    scan_config: ScanConfig,
    scanner: Scanner,
    cache: ResultCache,
    cache_enabled: bool,
    sessions: SessionManager,
    usage: Box<dyn UsageRecorder>,
    metrics: Box<dyn CodeMetrics>,
    health: Box<dyn HealthCheck>,
}

impl ServerContext {
    /// Builds the context from configuration, with the bundled services.
    ///
    /// Nothing is scanned here; construction stays cheap so `initialize`
    /// can be answered immediately.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            allowed_paths: config.allowed_paths.clone(),
            scan_config: config.scan.clone(),
            scanner: Scanner::new(config.scan.limits()),
            cache: ResultCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.capacity,
            ),
            cache_enabled: config.cache.enabled,
            sessions: SessionManager::new(
                Duration::from_secs(config.sessions.idle_timeout_secs),
                config.sessions.max_sessions,
            ),
            usage: Box::new(UsageLedger::new()),
            metrics: Box::new(LineMetrics),
            health: Box::new(ProcessHealth::new()),
        }
    }

    /// Replaces the allowed roots. An empty list allows any path.
    #[must_use]
    pub fn with_allowed_paths(mut self, allowed_paths: Vec<PathBuf>) -> Self {
        self.allowed_paths = allowed_paths;
        self
    }

    /// Replaces the scanner (for custom limits or memory probes).
    #[must_use]
    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Replaces the collaborator services.
    #[must_use]
    pub fn with_services(
        mut self,
        usage: Box<dyn UsageRecorder>,
        metrics: Box<dyn CodeMetrics>,
        health: Box<dyn HealthCheck>,
    ) -> Self {
        self.usage = usage;
        self.metrics = metrics;
        self.health = health;
        self
    }

    /// Scanner defaults and caps.
    #[must_use]
    pub const fn scan_config(&self) -> &ScanConfig {
        &self.scan_config
    }

    /// Books `amount` against `operation` in the usage recorder.
    pub fn record_usage(&mut self, operation: &str, amount: u64) {
        let ack = self.usage.record(operation, amount);
        tracing::trace!(operation = %ack.operation, total = ack.total, "Usage recorded");
    }

    /// Resolves a caller-supplied directory and checks it is allowed.
    ///
    /// # Errors
    ///
    /// Returns a resource error if the directory is missing or unreadable,
    /// or an access error if it lies outside the allowed roots.
    pub fn resolve_directory(&self, directory: &str) -> Result<PathBuf, ToolError> {
        let root = resolve_root(Path::new(directory))?;
        self.check_allowed(&root, directory)?;
        Ok(root)
    }

    /// Resolves a caller-supplied file path and checks it is allowed.
    ///
    /// # Errors
    ///
    /// Returns a resource error if the file is missing, or an access error
    /// if it lies outside the allowed roots.
    pub fn resolve_file(&self, filepath: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(filepath);
        let canonical = path.canonicalize().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ScanError::Inaccessible {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        self.check_allowed(&canonical, filepath)?;
        Ok(canonical)
    }

    fn check_allowed(&self, canonical: &Path, requested: &str) -> Result<(), ToolError> {
        if self.allowed_paths.is_empty() {
            return Ok(());
        }

        let allowed = self
            .allowed_paths
            .iter()
            .filter_map(|p| p.canonicalize().ok())
            .any(|root| canonical.starts_with(root));

        if allowed {
            Ok(())
        } else {
            Err(ToolError::AccessDenied {
                path: requested.to_string(),
            })
        }
    }

    /// Returns the sorted listing for `(root, filter, sort)`, from the cache
    /// when allowed and fresh.
    ///
    /// Partial listings are returned but never cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn listing(
        &mut self,
        root: &Path,
        filter: &EntryFilter,
        sort: SortSpec,
        use_cache: bool,
    ) -> Result<(Arc<ScanOutcome>, CacheStatus), ToolError> {
        let key = CacheKey::new(root.to_path_buf(), filter.clone(), sort);

        if self.cache_enabled && use_cache {
            if let Some(listing) = self.cache.get(&key) {
                tracing::debug!(fingerprint = key.fingerprint(), "Listing served from cache");
                return Ok((listing, CacheStatus::Hit));
            }
        }

        let listing = Arc::new(self.scanner.scan(root, filter)?.sorted(sort));

        let status = if !self.cache_enabled {
            CacheStatus::Disabled
        } else if use_cache {
            CacheStatus::Miss
        } else {
            CacheStatus::Bypass
        };

        if self.cache_enabled {
            if listing.partial() {
                tracing::info!(
                    root = %root.display(),
                    stop_reason = ?listing.stop,
                    "Partial listing not cached"
                );
            } else {
                self.cache.insert(key, Arc::clone(&listing));
            }
        }

        Ok((listing, status))
    }

    /// Computes the pagination plan of a listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn plan(
        &mut self,
        root: &Path,
        filter: &EntryFilter,
        batch_size: usize,
        use_cache: bool,
    ) -> Result<(PaginationPlan, Arc<ScanOutcome>), ToolError> {
        let (listing, _) = self.listing(root, filter, SortSpec::default(), use_cache)?;
        Ok((PaginationPlan::new(listing.entries.len(), batch_size), listing))
    }

    /// Opens a stream session.
    ///
    /// # Errors
    ///
    /// Returns an error if the first increment cannot be scanned.
    pub fn start_stream(
        &mut self,
        root: PathBuf,
        filter: EntryFilter,
        batch_size: usize,
    ) -> Result<StreamBatch, ToolError> {
        Ok(self
            .sessions
            .start(&mut self.scanner, root, filter, batch_size)?)
    }

    /// Advances a stream session.
    ///
    /// # Errors
    ///
    /// Returns a session-not-found error for unknown ids.
    pub fn next_stream(&mut self, session_id: &str) -> Result<StreamBatch, ToolError> {
        Ok(self.sessions.next(&mut self.scanner, session_id)?)
    }

    /// Stops a stream session.
    ///
    /// # Errors
    ///
    /// Returns a session-not-found error for unknown ids.
    pub fn stop_stream(&mut self, session_id: &str) -> Result<StoppedSession, ToolError> {
        Ok(self.sessions.stop(session_id)?)
    }

    /// Describes the live stream sessions after collecting idle ones.
    pub fn stream_summaries(&mut self) -> Vec<Value> {
        self.sessions.collect_idle();
        self.sessions.summaries()
    }

    /// Runs the code-metrics service on a file.
    ///
    /// # Errors
    ///
    /// Returns a resource error if the file cannot be read.
    pub fn analyze(&self, path: &Path) -> Result<MetricsReport, ToolError> {
        self.metrics.analyze(path).map_err(|e| {
            ScanError::Inaccessible {
                path: path.to_path_buf(),
                source: e,
            }
            .into()
        })
    }

    /// Health, usage, cache, and session figures.
    pub fn status(&mut self) -> Value {
        self.sessions.collect_idle();
        self.cache.purge_expired();
        json!({
            "health": self.health.status(),
            "usage": self.usage.summarize(),
            "cache": self.cache.to_json(),
            "cache_enabled": self.cache_enabled,
            "active_sessions": self.sessions.len(),
        })
    }
}
