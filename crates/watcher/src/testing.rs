//! In-memory collaborator fakes shared by the unit tests in this crate.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::{Result, bail};
use buildmon_core::{
    models::{BuildDetail, BuildEvent, BuildState, CachedBuildRecord, CommitRef, RepositorySnapshot},
    traits::{BuildCache, EventSink, LivenessSignal, SnapshotSource},
};
use time::{Duration, UtcDateTime};

pub(crate) fn snapshot(slug: &str, number: u64, state: BuildState) -> RepositorySnapshot {
    RepositorySnapshot {
        slug: slug.to_owned(),
        last_build_number: number,
        last_build_state: state,
        last_build_started_at: Some(UtcDateTime::now() - Duration::minutes(5)),
    }
}

pub(crate) fn detail(number: u64, state: Option<BuildState>) -> BuildDetail {
    BuildDetail { id: number * 100, number, state, duration_secs: Some(90) }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    pub repos: Vec<RepositorySnapshot>,
    pub details: HashMap<(String, u64), BuildDetail>,
    pub commits: HashMap<(String, u64), CommitRef>,
    pub failing_details: HashSet<String>,
    pub resyncs: AtomicUsize,
}

impl FakeSource {
    pub fn with_repo(mut self, snapshot: RepositorySnapshot) -> Self {
        self.repos.push(snapshot);
        self
    }

    pub fn with_detail(mut self, slug: &str, detail: BuildDetail) -> Self {
        self.details.insert((slug.to_owned(), detail.number), detail);
        self
    }

    pub fn with_commit(mut self, slug: &str, number: u64, branch: Option<&str>) -> Self {
        self.commits.insert(
            (slug.to_owned(), number),
            CommitRef { sha: format!("sha-{number}"), branch: branch.map(str::to_owned) },
        );
        self
    }

    /// Every detail fetch for this slug fails, as if the master were down.
    pub fn with_failing_detail(mut self, slug: &str) -> Self {
        self.failing_details.insert(slug.to_owned());
        self
    }
}

impl SnapshotSource for FakeSource {
    async fn list_repositories(&self) -> Result<Vec<RepositorySnapshot>> {
        Ok(self.repos.clone())
    }

    async fn fetch_build_detail(&self, slug: &str, number: u64) -> Result<Option<BuildDetail>> {
        if self.failing_details.contains(slug) {
            bail!("connection reset fetching {slug}#{number}");
        }
        Ok(self.details.get(&(slug.to_owned(), number)).cloned())
    }

    async fn resolve_commit(&self, slug: &str, number: u64) -> Result<Option<CommitRef>> {
        Ok(self.commits.get(&(slug.to_owned(), number)).cloned())
    }

    async fn resync_repository_list(&self) -> Result<()> {
        self.resyncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn build_url(&self, slug: &str, build_id: u64) -> String {
        format!("https://ci.example.org/{slug}/builds/{build_id}")
    }
}

/// Build cache fake. Unlike the production store it allows inserting raw
/// labels, which is the only way to reproduce corrupt legacy records.
#[derive(Default)]
pub(crate) struct FakeCache {
    entries: Mutex<HashMap<(String, String), (CachedBuildRecord, i64)>>,
}

impl FakeCache {
    pub fn insert_raw(&self, master: &str, slug: &str, label: &str, building: bool, ttl: i64) {
        self.entries.lock().unwrap().insert(
            (master.to_owned(), slug.to_owned()),
            (CachedBuildRecord { last_build_label: label.to_owned(), building }, ttl),
        );
    }

    pub fn record(&self, master: &str, slug: &str) -> Option<CachedBuildRecord> {
        self.entries
            .lock()
            .unwrap()
            .get(&(master.to_owned(), slug.to_owned()))
            .map(|(record, _)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl BuildCache for FakeCache {
    async fn list_known_slugs(&self, master: &str) -> Result<Vec<String>> {
        let mut slugs = self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|(m, _)| m == master)
            .map(|(_, slug)| slug.clone())
            .collect::<Vec<_>>();
        slugs.sort();
        Ok(slugs)
    }

    async fn get_record(&self, master: &str, slug: &str) -> Result<Option<CachedBuildRecord>> {
        Ok(self.record(master, slug))
    }

    async fn put_record(
        &self,
        master: &str,
        slug: &str,
        build_number: u64,
        building: bool,
        ttl_secs: i64,
    ) -> Result<()> {
        self.insert_raw(master, slug, &build_number.to_string(), building, ttl_secs);
        Ok(())
    }

    async fn get_ttl(&self, master: &str, slug: &str) -> Result<i64> {
        match self.entries.lock().unwrap().get(&(master.to_owned(), slug.to_owned())) {
            Some((_, ttl)) => Ok(*ttl),
            None => bail!("no cache entry for {master}:{slug}"),
        }
    }

    async fn set_ttl(&self, master: &str, slug: &str, ttl_secs: i64) -> Result<()> {
        match self.entries.lock().unwrap().get_mut(&(master.to_owned(), slug.to_owned())) {
            Some((_, ttl)) => {
                *ttl = ttl_secs;
                Ok(())
            }
            None => bail!("no cache entry for {master}:{slug}"),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<BuildEvent>>,
    failing_slugs: HashSet<String>,
}

impl RecordingSink {
    /// Every publish addressed to this slug fails, as if the endpoint
    /// rejected it.
    pub fn with_failing_slug(mut self, slug: &str) -> Self {
        self.failing_slugs.insert(slug.to_owned());
        self
    }

    pub fn take(&self) -> Vec<BuildEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

impl EventSink for RecordingSink {
    async fn publish(&self, event: BuildEvent) -> Result<()> {
        if self.failing_slugs.contains(&event.slug) {
            bail!("endpoint rejected event for {}", event.slug);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub(crate) struct FlagLiveness(pub AtomicBool);

impl FlagLiveness {
    pub fn live(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }
}

impl LivenessSignal for FlagLiveness {
    fn is_live(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
