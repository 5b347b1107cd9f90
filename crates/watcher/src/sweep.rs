use anyhow::Result;
use buildmon_core::traits::{BuildCache, TTL_UNSET};

/// Backfills a TTL onto legacy cache records lacking one. Idempotent and safe
/// to run every cycle; records that already carry a TTL are untouched.
///
/// Transitional: removable once no sentinel-TTL records remain.
pub async fn migrate_ttls<C: BuildCache>(master: &str, cache: &C, ttl_secs: i64) -> Result<usize> {
    let mut migrated = 0;
    for slug in cache.list_known_slugs(master).await? {
        let ttl = match cache.get_ttl(master, &slug).await {
            Ok(ttl) => ttl,
            Err(e) => {
                tracing::warn!("Failed to read TTL for {}:{}: {:?}", master, slug, e);
                continue;
            }
        };
        if ttl == TTL_UNSET {
            cache.set_ttl(master, &slug, ttl_secs).await?;
            migrated += 1;
        }
    }
    if migrated > 0 {
        tracing::info!("{}: backfilled TTLs onto {} legacy cache records", master, migrated);
    }
    Ok(migrated)
}
