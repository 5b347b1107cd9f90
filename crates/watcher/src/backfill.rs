use buildmon_core::{
    models::{BuildDetail, BuildEvent, BuildState},
    traits::{EventSink, SnapshotSource},
};

use crate::error::WatchError;

/// Reconstructs and emits events for every build skipped between the cached
/// and the current build number, strictly ascending. The current build itself
/// is emitted separately by the orchestrator.
///
/// A single poll interval can span multiple completed builds; without this,
/// intermediate builds would never reach consumers keying off discrete build
/// events. Builds the master has not finished populating are skipped without
/// error; they are not yet observable.
pub async fn emit_intermediate_builds<S: SnapshotSource, E: EventSink>(
    master: &str,
    source: &S,
    sink: Option<&E>,
    slug: &str,
    cached_number: u64,
    current_number: u64,
    threshold: u64,
) -> Result<usize, WatchError> {
    let next_expected = cached_number.saturating_add(threshold);
    if next_expected >= current_number {
        return Ok(0);
    }
    let mut emitted = 0;
    for number in next_expected..current_number {
        let detail = source
            .fetch_build_detail(slug, number)
            .await
            .map_err(|e| WatchError::fetch(slug, e))?;
        let Some(detail) = detail else {
            tracing::debug!("Build {}#{} not observable yet, skipping", slug, number);
            continue;
        };
        let Some(state) = detail.state else {
            tracing::debug!("Build {}#{} has no state yet, skipping", slug, number);
            continue;
        };
        let url = source.build_url(slug, detail.id);
        crate::emit(sink, slug, detail_event(master, slug, &detail, state, url)).await?;
        emitted += 1;
    }
    Ok(emitted)
}

pub(crate) fn detail_event(
    master: &str,
    slug: &str,
    detail: &BuildDetail,
    state: BuildState,
    url: String,
) -> BuildEvent {
    BuildEvent {
        master: master.to_owned(),
        slug: slug.to_owned(),
        building: state.is_running(),
        number: detail.number,
        duration_secs: detail.duration_secs,
        outcome: state.outcome(),
        url,
    }
}
