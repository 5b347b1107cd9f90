use buildmon_core::models::{CachedBuildRecord, RepositorySnapshot};

use crate::error::WatchError;

/// How a repository's fetched snapshot relates to its cached record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Classification {
    /// No cached record exists; the repository is adopted as-is.
    New,
    /// Running flag or build number differs from the cache.
    Changed { cached_number: u64 },
    Unchanged,
}

/// Compares a fetched snapshot against the cached record.
///
/// A cached label that does not parse as a build number yields
/// [`WatchError::CorruptCacheEntry`]; the caller skips the repository and the
/// record is left in place until its TTL evicts it.
pub fn classify(
    snapshot: &RepositorySnapshot,
    cached: Option<&CachedBuildRecord>,
) -> Result<Classification, WatchError> {
    let Some(record) = cached else {
        return Ok(Classification::New);
    };
    let cached_number = record.last_build_label.parse::<u64>().map_err(|_| {
        WatchError::CorruptCacheEntry {
            slug: snapshot.slug.clone(),
            label: record.last_build_label.clone(),
        }
    })?;
    if snapshot.last_build_state.is_running() != record.building
        || snapshot.last_build_number != cached_number
    {
        Ok(Classification::Changed { cached_number })
    } else {
        Ok(Classification::Unchanged)
    }
}
