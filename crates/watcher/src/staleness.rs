use buildmon_core::models::RepositorySnapshot;
use time::{Duration, UtcDateTime};

/// Compensates for the master reporting a build before its start timestamp is
/// populated; without it a just-started build could be misclassified as
/// already past its cache TTL and silently dropped.
pub const STALE_GRACE_SECS: i64 = 300;

/// Drops snapshots whose last build is older than the retention window, so
/// builds whose cache entries would already be evicted are not reprocessed.
/// Snapshots without a start timestamp are excluded.
pub fn retain_fresh(
    snapshots: Vec<RepositorySnapshot>,
    retention_days: u32,
    now: UtcDateTime,
) -> Vec<RepositorySnapshot> {
    let threshold =
        now - Duration::days(retention_days as i64) + Duration::seconds(STALE_GRACE_SECS);
    snapshots
        .into_iter()
        .filter(|snapshot| snapshot.last_build_started_at.is_some_and(|t| t > threshold))
        .collect()
}
