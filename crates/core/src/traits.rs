//! Collaborator seams consumed by the watcher core.
//!
//! The watcher is generic over these traits and takes its collaborators as
//! explicit constructor arguments; optional collaborators (event sink,
//! liveness signal) are held as `Option` rather than no-op implementations.

use std::future::Future;

use anyhow::Result;

use crate::models::{BuildDetail, BuildEvent, CachedBuildRecord, CommitRef, RepositorySnapshot};

/// TTL value meaning "no expiry has been set yet" on a legacy cache record.
pub const TTL_UNSET: i64 = -1;

/// Read access to one master's view of the CI service.
pub trait SnapshotSource: Send + Sync {
    /// Current build-state snapshots for all repositories known to the master.
    fn list_repositories(&self) -> impl Future<Output = Result<Vec<RepositorySnapshot>>> + Send;

    /// Fetch a single build. `None` when the master does not (yet) expose it.
    fn fetch_build_detail(
        &self,
        slug: &str,
        number: u64,
    ) -> impl Future<Output = Result<Option<BuildDetail>>> + Send;

    /// Resolve the commit behind a build. `None` when no commit is found.
    fn resolve_commit(
        &self,
        slug: &str,
        number: u64,
    ) -> impl Future<Output = Result<Option<CommitRef>>> + Send;

    /// Trigger a resynchronization of the master's repository list.
    fn resync_repository_list(&self) -> impl Future<Output = Result<()>> + Send;

    /// Deep link to a build on the master's web UI.
    fn build_url(&self, slug: &str, build_id: u64) -> String;
}

/// Key-value store of last-known build records with per-key TTL.
///
/// Records are read and replaced whole; writes are last-writer-wins.
pub trait BuildCache: Send + Sync {
    fn list_known_slugs(&self, master: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn get_record(
        &self,
        master: &str,
        slug: &str,
    ) -> impl Future<Output = Result<Option<CachedBuildRecord>>> + Send;

    fn put_record(
        &self,
        master: &str,
        slug: &str,
        build_number: u64,
        building: bool,
        ttl_secs: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The TTL a record was written with, or [`TTL_UNSET`] for legacy records.
    fn get_ttl(&self, master: &str, slug: &str) -> impl Future<Output = Result<i64>> + Send;

    fn set_ttl(
        &self,
        master: &str,
        slug: &str,
        ttl_secs: i64,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Delivery of build-lifecycle events to downstream consumers.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: BuildEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Cooperative gate checked once per scheduled tick. Not a lock: replicas may
/// both report live, and duplicate emission must be tolerated downstream.
pub trait LivenessSignal: Send + Sync {
    fn is_live(&self) -> bool;
}

/// Liveness signal for deployments without discovery integration.
pub struct AlwaysLive;

impl LivenessSignal for AlwaysLive {
    fn is_live(&self) -> bool { true }
}
