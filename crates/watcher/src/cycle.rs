use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use buildmon_core::{
    config::PollConfig,
    models::{BuildEvent, CycleResult, RepoChange, RepositorySnapshot},
    traits::{BuildCache, EventSink, LivenessSignal, SnapshotSource},
};
use time::UtcDateTime;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    backfill, branch,
    detect::{self, Classification},
    error::WatchError,
    staleness, sweep,
};

/// Drives polling cycles for one master.
///
/// Collaborators are taken as explicit constructor arguments; the event sink
/// and liveness signal are optional. The watcher exposes a single-shot
/// [`poll`](Self::poll) entry point and owns no timer; scheduling belongs to
/// the caller.
pub struct BuildWatcher<S, C, E, L> {
    master: String,
    source: Arc<S>,
    cache: Arc<C>,
    sink: Option<Arc<E>>,
    liveness: Option<Arc<L>>,
    poll: PollConfig,
    last_poll: Mutex<Option<UtcDateTime>>,
}

impl<S, C, E, L> BuildWatcher<S, C, E, L>
where
    S: SnapshotSource + 'static,
    C: BuildCache + 'static,
    E: EventSink + 'static,
    L: LivenessSignal,
{
    pub fn new(
        master: impl Into<String>,
        source: Arc<S>,
        cache: Arc<C>,
        sink: Option<Arc<E>>,
        liveness: Option<Arc<L>>,
        poll: PollConfig,
    ) -> Self {
        Self {
            master: master.into(),
            source,
            cache,
            sink,
            liveness,
            poll,
            last_poll: Mutex::new(None),
        }
    }

    pub fn master(&self) -> &str { &self.master }

    /// When the last cycle was attempted, or `None` while not serving.
    pub fn last_poll(&self) -> Option<UtcDateTime> { *self.last_poll.lock().unwrap() }

    pub fn poll_interval_secs(&self) -> u64 { self.poll.interval_secs }

    /// Scheduled-tick entry point. When the instance is not serving traffic
    /// the cycle is skipped and the freshness marker is cleared, so a
    /// non-serving replica neither reports stale freshness nor emits.
    pub async fn poll(&self) -> Result<Option<CycleResult>> {
        if let Some(liveness) = &self.liveness
            && !liveness.is_live()
        {
            tracing::info!("{}: not in service, skipping cycle", self.master);
            *self.last_poll.lock().unwrap() = None;
            return Ok(None);
        }
        self.run_cycle().await.map(Some)
    }

    /// One polling pass over all repositories of this master.
    pub async fn run_cycle(&self) -> Result<CycleResult> {
        // Advance the marker even if the rest of the cycle fails, so liveness
        // reporting reflects attempted work.
        *self.last_poll.lock().unwrap() = Some(UtcDateTime::now());

        if let Err(e) =
            sweep::migrate_ttls(&self.master, self.cache.as_ref(), self.poll.ttl_secs()).await
        {
            tracing::warn!("TTL migration sweep failed for {}: {:?}", self.master, e);
        }

        let snapshots = self
            .source
            .list_repositories()
            .await
            .with_context(|| format!("Failed to list repositories for {}", self.master))?;
        let total = snapshots.len();
        let retained =
            staleness::retain_fresh(snapshots, self.poll.retention_days, UtcDateTime::now());
        tracing::debug!(
            "{}: {} of {} repositories within retention window",
            self.master,
            retained.len(),
            total
        );

        struct TaskResult {
            slug: String,
            result: Result<Option<RepoChange>, WatchError>,
        }
        let sem = Arc::new(Semaphore::new(self.poll.max_concurrency.max(1)));
        let mut set = JoinSet::new();
        for snapshot in retained {
            let sem = sem.clone();
            let master = self.master.clone();
            let source = self.source.clone();
            let cache = self.cache.clone();
            let sink = self.sink.clone();
            let threshold = self.poll.backfill_threshold;
            let ttl_secs = self.poll.ttl_secs();
            set.spawn(async move {
                let _permit = sem.acquire().await.unwrap();
                let slug = snapshot.slug.clone();
                let result = process_repository(
                    &master,
                    source.as_ref(),
                    cache.as_ref(),
                    sink.as_deref(),
                    snapshot,
                    threshold,
                    ttl_secs,
                )
                .await;
                TaskResult { slug, result }
            });
        }

        let mut changes = Vec::new();
        while let Some(join_result) = set.join_next().await {
            match join_result {
                Ok(TaskResult { result: Ok(Some(change)), .. }) => changes.push(change),
                Ok(TaskResult { result: Ok(None), .. }) => {}
                Ok(TaskResult { slug, result: Err(e) }) => {
                    tracing::error!("Failed to process {} on {}: {:?}", slug, self.master, e);
                }
                Err(e) => {
                    tracing::error!("Repository task failed on {}: {:?}", self.master, e);
                }
            }
        }

        if self.poll.full_resync
            && let Err(e) = self.source.resync_repository_list().await
        {
            tracing::error!("Repository resync failed for {}: {:?}", self.master, e);
        }

        tracing::info!("{}: cycle complete, {} changed repositories", self.master, changes.len());
        Ok(CycleResult { changes })
    }
}

async fn process_repository<S, C, E>(
    master: &str,
    source: &S,
    cache: &C,
    sink: Option<&E>,
    snapshot: RepositorySnapshot,
    backfill_threshold: u64,
    ttl_secs: i64,
) -> Result<Option<RepoChange>, WatchError>
where
    S: SnapshotSource,
    C: BuildCache,
    E: EventSink,
{
    let slug = snapshot.slug.clone();
    let previous =
        cache.get_record(master, &slug).await.map_err(|e| WatchError::cache(&slug, e))?;
    let building = snapshot.last_build_state.is_running();
    match detect::classify(&snapshot, previous.as_ref())? {
        Classification::Unchanged => Ok(None),
        Classification::New => {
            cache
                .put_record(master, &slug, snapshot.last_build_number, building, ttl_secs)
                .await
                .map_err(|e| WatchError::cache(&slug, e))?;
            let event = current_build_event(master, source, &snapshot).await?;
            crate::emit(sink, &slug, event).await?;
            tracing::info!(
                "{}: adopted new repository {} at build {}",
                master,
                slug,
                snapshot.last_build_number
            );
            Ok(Some(RepoChange { slug, previous: None, current: snapshot }))
        }
        Classification::Changed { cached_number } => {
            cache
                .put_record(master, &slug, snapshot.last_build_number, building, ttl_secs)
                .await
                .map_err(|e| WatchError::cache(&slug, e))?;
            let emitted = backfill::emit_intermediate_builds(
                master,
                source,
                sink,
                &slug,
                cached_number,
                snapshot.last_build_number,
                backfill_threshold,
            )
            .await?;
            if emitted > 0 {
                tracing::info!("{}: backfilled {} builds for {}", master, emitted, slug);
            }
            let event = current_build_event(master, source, &snapshot).await?;
            crate::emit(sink, &slug, event.clone()).await?;
            if let Err(e) =
                branch::emit_branch_alias(master, source, cache, sink, &snapshot, &event, ttl_secs)
                    .await
            {
                tracing::warn!("{}: branch aliasing failed for {}: {}", master, slug, e);
            }
            Ok(Some(RepoChange { slug, previous, current: snapshot }))
        }
    }
}

/// Builds the "current build" event. The build's own detail supplies id,
/// duration and final state; when the master has not exposed the detail yet,
/// the event falls back to what the snapshot carries.
async fn current_build_event<S: SnapshotSource>(
    master: &str,
    source: &S,
    snapshot: &RepositorySnapshot,
) -> Result<BuildEvent, WatchError> {
    let slug = &snapshot.slug;
    let number = snapshot.last_build_number;
    let detail = source
        .fetch_build_detail(slug, number)
        .await
        .map_err(|e| WatchError::fetch(slug, e))?;
    Ok(match detail {
        Some(detail) => {
            let state = detail.state.unwrap_or(snapshot.last_build_state);
            let url = source.build_url(slug, detail.id);
            backfill::detail_event(master, slug, &detail, state, url)
        }
        None => BuildEvent {
            master: master.to_owned(),
            slug: slug.clone(),
            building: snapshot.last_build_state.is_running(),
            number,
            duration_secs: None,
            outcome: snapshot.last_build_state.outcome(),
            url: source.build_url(slug, number),
        },
    })
}
