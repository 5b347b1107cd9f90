use thiserror::Error;

/// Failure processing a single repository. None of these abort the cycle;
/// the orchestrator logs them and moves on to the next repository.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("fetch failed for {slug}")]
    TransientFetch {
        slug: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cached build label {label:?} for {slug} is not a build number")]
    CorruptCacheEntry { slug: String, label: String },
    #[error("cache access failed for {slug}")]
    Cache {
        slug: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("event publish failed for {slug}")]
    Sink {
        slug: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WatchError {
    pub(crate) fn fetch(slug: &str, source: anyhow::Error) -> Self {
        Self::TransientFetch { slug: slug.to_owned(), source }
    }

    pub(crate) fn cache(slug: &str, source: anyhow::Error) -> Self {
        Self::Cache { slug: slug.to_owned(), source }
    }

    pub(crate) fn sink(slug: &str, source: anyhow::Error) -> Self {
        Self::Sink { slug: slug.to_owned(), source }
    }
}
