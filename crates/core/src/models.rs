use std::{fmt, str::FromStr};

use serde::Serialize;
use time::UtcDateTime;

/// Lifecycle state of a build as reported by the CI service.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Created,
    Started,
    Passed,
    Failed,
    Errored,
    Canceled,
}

impl BuildState {
    /// Whether the build is still in flight.
    pub fn is_running(&self) -> bool { matches!(self, Self::Created | Self::Started) }

    /// Classified result for terminal states; running builds have no outcome yet.
    pub fn outcome(&self) -> Option<BuildOutcome> {
        match self {
            Self::Created | Self::Started => None,
            Self::Passed => Some(BuildOutcome::Success),
            Self::Failed | Self::Errored => Some(BuildOutcome::Failure),
            Self::Canceled => Some(BuildOutcome::Aborted),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Canceled => "canceled",
        }
    }
}

impl FromStr for BuildState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "started" => Ok(Self::Started),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "errored" => Ok(Self::Errored),
            "canceled" => Ok(Self::Canceled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Classified result carried on events for completed builds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    Success,
    Failure,
    Aborted,
}

/// Current build state of one repository, as fetched from the master.
/// Produced fresh each cycle; immutable once fetched.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RepositorySnapshot {
    pub slug: String,
    pub last_build_number: u64,
    pub last_build_state: BuildState,
    pub last_build_started_at: Option<UtcDateTime>,
}

/// Last known build per (master, slug), as held by the build cache.
///
/// The build number is kept string-encoded; records written by earlier
/// deployments may hold labels that no longer parse.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CachedBuildRecord {
    pub last_build_label: String,
    pub building: bool,
}

/// One individually fetched build, used only during backfill.
///
/// A `None` state means the master has not finished populating the build
/// yet; it is not observable and not an error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BuildDetail {
    pub id: u64,
    pub number: u64,
    pub state: Option<BuildState>,
    pub duration_secs: Option<u64>,
}

/// Commit reference resolved for a specific build.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommitRef {
    pub sha: String,
    pub branch: Option<String>,
}

/// Outbound build-lifecycle event. Write-once; no acknowledgment is tracked.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct BuildEvent {
    pub master: String,
    pub slug: String,
    pub building: bool,
    pub number: u64,
    pub duration_secs: Option<u64>,
    pub outcome: Option<BuildOutcome>,
    pub url: String,
}

/// One repository whose state changed during a cycle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RepoChange {
    pub slug: String,
    pub previous: Option<CachedBuildRecord>,
    pub current: RepositorySnapshot,
}

/// Audit trail returned from a polling cycle. Changes appear in completion
/// order; no ordering across repositories is implied.
#[derive(Debug, Clone, Default)]
pub struct CycleResult {
    pub changes: Vec<RepoChange>,
}

impl CycleResult {
    pub fn is_empty(&self) -> bool { self.changes.is_empty() }

    pub fn len(&self) -> usize { self.changes.len() }
}
