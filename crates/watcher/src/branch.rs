use buildmon_core::{
    models::{BuildEvent, RepositorySnapshot},
    traits::{BuildCache, EventSink, SnapshotSource},
};

use crate::error::WatchError;

/// Emits a second, branch-qualified cache entry and event for the current
/// build, letting downstream subscribers filter per branch without the
/// snapshot source being branch-aware.
///
/// Applies to the current build only, never to backfilled builds. Returns the
/// branch-qualified slug when one was written.
pub async fn emit_branch_alias<S, C, E>(
    master: &str,
    source: &S,
    cache: &C,
    sink: Option<&E>,
    snapshot: &RepositorySnapshot,
    current_event: &BuildEvent,
    ttl_secs: i64,
) -> Result<Option<String>, WatchError>
where
    S: SnapshotSource,
    C: BuildCache,
    E: EventSink,
{
    let slug = &snapshot.slug;
    let number = snapshot.last_build_number;
    let commit = match source.resolve_commit(slug, number).await {
        Ok(Some(commit)) => commit,
        Ok(None) => return Ok(None),
        // Unresolvable commits are a no-op, not a repository failure: the
        // canonical record and event are already out.
        Err(e) => {
            tracing::warn!("Commit resolution failed for {}#{}: {:?}", slug, number, e);
            return Ok(None);
        }
    };
    let Some(branch) = commit.branch.filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    let branch_slug = format!("{slug}/{branch}");
    if branch_slug == *slug {
        return Ok(None);
    }
    cache
        .put_record(
            master,
            &branch_slug,
            number,
            snapshot.last_build_state.is_running(),
            ttl_secs,
        )
        .await
        .map_err(|e| WatchError::cache(&branch_slug, e))?;
    let mut event = current_event.clone();
    event.slug = branch_slug.clone();
    crate::emit(sink, &branch_slug, event).await?;
    Ok(Some(branch_slug))
}
