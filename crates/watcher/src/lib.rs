//! Polling engine for CI masters.
//!
//! A [`BuildWatcher`] drives repeated cycles against one master: list the
//! repositories, drop stale ones, diff each against the build cache, backfill
//! builds that completed between polls, and publish one event per observed
//! build. Collaborators (snapshot source, cache, sink, liveness) are plain
//! traits supplied at construction.

use buildmon_core::{models::BuildEvent, traits::EventSink};

pub mod backfill;
pub mod branch;
pub mod cycle;
pub mod detect;
pub mod error;
pub mod staleness;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::BuildWatcher;
pub use error::WatchError;

/// Publishes to the sink when one is configured. Cache bookkeeping never
/// depends on a sink being present.
pub(crate) async fn emit<E: EventSink>(
    sink: Option<&E>,
    slug: &str,
    event: BuildEvent,
) -> Result<(), WatchError> {
    match sink {
        Some(sink) => sink.publish(event).await.map_err(|e| WatchError::sink(slug, e)),
        None => Ok(()),
    }
}
