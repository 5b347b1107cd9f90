//! In-process build cache with per-entry TTL.
//!
//! Backs the daemon and tests. Entries are expired lazily on read; a record
//! written with [`TTL_UNSET`] never expires, mirroring legacy records from
//! deployments that predate TTL enforcement.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Result, bail};
use buildmon_core::{
    models::CachedBuildRecord,
    traits::{BuildCache, TTL_UNSET},
};

#[derive(Debug, Clone)]
struct Entry {
    record: CachedBuildRecord,
    ttl_secs: i64,
    written_at: u64,
}

impl Entry {
    fn expired(&self, now: u64) -> bool {
        self.ttl_secs >= 0 && now >= self.written_at + self.ttl_secs as u64
    }
}

#[derive(Default)]
pub struct MemoryBuildCache {
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl MemoryBuildCache {
    pub fn new() -> Self { Self::default() }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
    }

    fn key(master: &str, slug: &str) -> (String, String) { (master.to_owned(), slug.to_owned()) }
}

impl BuildCache for MemoryBuildCache {
    async fn list_known_slugs(&self, master: &str) -> Result<Vec<String>> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| !entry.expired(now));
        Ok(entries.keys().filter(|(m, _)| m == master).map(|(_, slug)| slug.clone()).collect())
    }

    async fn get_record(&self, master: &str, slug: &str) -> Result<Option<CachedBuildRecord>> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        let key = Self::key(master, slug);
        match entries.get(&key) {
            Some(entry) if entry.expired(now) => {
                tracing::debug!("Evicting expired record {}:{}", master, slug);
                entries.remove(&key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.record.clone())),
            None => Ok(None),
        }
    }

    async fn put_record(
        &self,
        master: &str,
        slug: &str,
        build_number: u64,
        building: bool,
        ttl_secs: i64,
    ) -> Result<()> {
        let entry = Entry {
            record: CachedBuildRecord { last_build_label: build_number.to_string(), building },
            ttl_secs,
            written_at: Self::now(),
        };
        self.entries.lock().unwrap().insert(Self::key(master, slug), entry);
        Ok(())
    }

    async fn get_ttl(&self, master: &str, slug: &str) -> Result<i64> {
        let entries = self.entries.lock().unwrap();
        match entries.get(&Self::key(master, slug)) {
            Some(entry) => Ok(entry.ttl_secs),
            None => bail!("no cache entry for {master}:{slug}"),
        }
    }

    async fn set_ttl(&self, master: &str, slug: &str, ttl_secs: i64) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&Self::key(master, slug)) {
            Some(entry) => {
                // The new TTL counts from now, like a fresh write.
                entry.ttl_secs = ttl_secs;
                entry.written_at = Self::now();
                Ok(())
            }
            None => bail!("no cache entry for {master}:{slug}"),
        }
    }
}
