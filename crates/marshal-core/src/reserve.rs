use crate::api::{
    AUTO_RESERVE_REASON, AcquireRequest, CoordinationApi, ReleaseRequest, RenewRequest,
    ReservationMetadata, ReservationRecord,
};
use crate::error::ApiError;
use chrono::{DateTime, Duration, Utc};
use marshal_vcs::StatusEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Component;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConflict {
    pub path: String,
    pub holder: String,
    pub retry_after_secs: i64,
}

/// Result of one reconciliation pass. Never blocking: a hard failure
/// lands in `warning` and the underlying tool still runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub acquired: Vec<String>,
    pub renewed: Vec<String>,
    pub released: Vec<String>,
    pub conflicts: Vec<ReservationConflict>,
    pub warning: Option<String>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.acquired.is_empty()
            && self.renewed.is_empty()
            && self.released.is_empty()
            && self.conflicts.is_empty()
            && self.warning.is_none()
    }
}

/// Paths that should be reserved right now: uncommitted working-tree
/// changes, excluding deletions and (by default) untracked files, and
/// rejecting anything that resolves outside the repository root.
pub fn desired_paths(entries: &[StatusEntry], include_untracked: bool) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|entry| !entry.is_deleted())
        .filter(|entry| include_untracked || !entry.is_untracked())
        .map(|entry| entry.path.clone())
        .filter(|path| !escapes_root(path))
        .collect()
}

/// Lexical traversal check; the path need not exist (rename sources
/// and deletions do not).
fn escapes_root(path: &str) -> bool {
    let path = std::path::Path::new(path);
    if path.is_absolute() {
        return true;
    }
    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationDiff {
    pub to_acquire: Vec<String>,
    pub to_renew: Vec<String>,
    pub to_release: Vec<String>,
}

impl ReservationDiff {
    pub fn is_empty(&self) -> bool {
        self.to_acquire.is_empty() && self.to_renew.is_empty() && self.to_release.is_empty()
    }
}

/// Partition desired against held. Only reservations this agent holds
/// with the auto-managed reason are ever renewed or released;
/// manually-created reservations and other holders are never touched.
///
/// Renewals are issued only once a lease has burned through half its
/// TTL, so an immediately repeated pass with an unchanged tree issues
/// no calls at all.
pub fn compute_diff(
    desired: &BTreeSet<String>,
    held: &[ReservationRecord],
    self_alias: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> ReservationDiff {
    let mut held_any: BTreeSet<&str> = BTreeSet::new();
    let mut held_auto: BTreeMap<&str, &ReservationRecord> = BTreeMap::new();
    for record in held {
        if record.holder_alias != self_alias {
            continue;
        }
        held_any.insert(record.resource_key.as_str());
        if record.is_auto_managed() {
            held_auto.insert(record.resource_key.as_str(), record);
        }
    }

    let renewal_due = |record: &ReservationRecord| record.expires_at - now <= ttl / 2;

    let to_acquire = desired
        .iter()
        .filter(|path| !held_any.contains(path.as_str()))
        .cloned()
        .collect();
    let to_renew = desired
        .iter()
        .filter_map(|path| held_auto.get(path.as_str()).map(|record| (path, *record)))
        .filter(|(_, record)| renewal_due(record))
        .map(|(path, _)| path.clone())
        .collect();
    let to_release = held_auto
        .keys()
        .filter(|key| !desired.contains(**key))
        .map(ToString::to_string)
        .collect();

    ReservationDiff {
        to_acquire,
        to_renew,
        to_release,
    }
}

pub struct Reconciler<'a, A: CoordinationApi> {
    api: &'a A,
    repo_id: &'a str,
    alias: &'a str,
    ttl_secs: u64,
}

impl<'a, A: CoordinationApi> Reconciler<'a, A> {
    pub fn new(api: &'a A, repo_id: &'a str, alias: &'a str, ttl_secs: u64) -> Self {
        Self {
            api,
            repo_id,
            alias,
            ttl_secs,
        }
    }

    /// One reconciliation pass: acquisitions first, then renewals,
    /// then releases, each in ascending path order. A held-elsewhere
    /// conflict is recorded per path and processing continues; any
    /// other failure aborts the rest of the pass with a warning.
    pub fn reconcile(
        &self,
        entries: &[StatusEntry],
        include_untracked: bool,
    ) -> ReconcileOutcome {
        let desired = desired_paths(entries, include_untracked);

        let held = match self.api.list_reservations(self.repo_id) {
            Ok(held) => held,
            Err(err) => {
                return ReconcileOutcome {
                    warning: Some(format!("listing reservations failed: {err}")),
                    ..ReconcileOutcome::default()
                };
            }
        };

        let now = Utc::now();
        let ttl = Duration::seconds(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX));
        let diff = compute_diff(&desired, &held, self.alias, ttl, now);
        if diff.is_empty() {
            return ReconcileOutcome::default();
        }

        let mut outcome = ReconcileOutcome::default();

        for path in &diff.to_acquire {
            let request = AcquireRequest {
                alias: self.alias.to_string(),
                resource_key: path.clone(),
                ttl_seconds: self.ttl_secs,
                metadata: ReservationMetadata {
                    reason: AUTO_RESERVE_REASON.to_string(),
                },
            };
            match self.api.acquire_reservation(&request) {
                Ok(_) => outcome.acquired.push(path.clone()),
                Err(ApiError::ReservationHeld { holder, expires_at }) => {
                    outcome.conflicts.push(ReservationConflict {
                        path: path.clone(),
                        holder,
                        retry_after_secs: (expires_at - now).num_seconds().max(0),
                    });
                }
                Err(err) => {
                    outcome.warning = Some(format!("reserving {path} failed: {err}"));
                    return outcome;
                }
            }
        }

        for path in &diff.to_renew {
            let request = RenewRequest {
                alias: self.alias.to_string(),
                resource_key: path.clone(),
                ttl_seconds: self.ttl_secs,
            };
            if let Err(err) = self.api.renew_reservation(&request) {
                outcome.warning = Some(format!("renewing {path} failed: {err}"));
                return outcome;
            }
            outcome.renewed.push(path.clone());
        }

        for path in &diff.to_release {
            let request = ReleaseRequest {
                alias: self.alias.to_string(),
                resource_key: path.clone(),
            };
            if let Err(err) = self.api.release_reservation(&request) {
                outcome.warning = Some(format!("releasing {path} failed: {err}"));
                return outcome;
            }
            outcome.released.push(path.clone());
        }

        outcome
    }
}
