use crate::api::{CoordinationApi, SyncMode, SyncUploadRequest};
use crate::config::CONFIG_DIR;
use crate::error::{ApiError, SyncError};
use crate::runner::ProcessRunner;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SYNC_STATE_FILE: &str = "sync-state.json";
pub const ISSUES_EXPORT_FILE: &str = "issues.jsonl";
pub const PROTOCOL_VERSION: u32 = 1;

/// Per-issue content hashes from the last confirmed upload.
///
/// Absent or unreadable state is never an error; it just means the
/// next sync is a full one. Hashes advance only after the server
/// confirms an upload, so a failed run retries a superset of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
    #[serde(rename = "issueHashes")]
    pub issue_hashes: BTreeMap<String, String>,
}

impl SyncState {
    pub fn load(path: &Path) -> SyncState {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn store(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    fn needs_full(&self) -> bool {
        self.protocol_version == 0
    }
}

pub fn state_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_DIR).join(SYNC_STATE_FILE)
}

pub fn export_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_DIR).join(ISSUES_EXPORT_FILE)
}

/// Hash every JSONL issue line, keyed by issue id. The hash covers the
/// raw line, so any field change shows up.
pub fn hash_issues(jsonl: &str) -> Result<BTreeMap<String, IssueLine>, SyncError> {
    let mut hashes = BTreeMap::new();
    for line in jsonl.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|_| SyncError::MissingId {
                line: line.to_string(),
            })?;
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SyncError::MissingId {
                line: line.to_string(),
            })?;
        let digest = Sha256::digest(line.as_bytes());
        hashes.insert(
            id.to_string(),
            IssueLine {
                hash: hex::encode(digest),
                value,
            },
        );
    }
    Ok(hashes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueLine {
    pub hash: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: Option<SyncMode>,
    pub changed: usize,
    pub deleted: usize,
    pub skipped: bool,
    pub retried_full: bool,
    pub warning: Option<String>,
}

impl SyncReport {
    fn warn(message: String) -> Self {
        SyncReport {
            warning: Some(message),
            ..SyncReport::default()
        }
    }
}

pub struct SyncManager<'a, A: CoordinationApi, R: ProcessRunner> {
    api: &'a A,
    runner: &'a R,
    workspace_id: &'a str,
    repo_id: &'a str,
    alias: &'a str,
    tracker_bin: &'a str,
    repo_root: &'a Path,
}

impl<'a, A: CoordinationApi, R: ProcessRunner> SyncManager<'a, A, R> {
    pub fn new(
        api: &'a A,
        runner: &'a R,
        workspace_id: &'a str,
        repo_id: &'a str,
        alias: &'a str,
        tracker_bin: &'a str,
        repo_root: &'a Path,
    ) -> Self {
        Self {
            api,
            runner,
            workspace_id,
            repo_id,
            alias,
            tracker_bin,
            repo_root,
        }
    }

    /// Upload local issue state after a successful mutating command.
    /// Every failure is a warning; local state only advances after a
    /// confirmed upload.
    pub fn run(&self) -> SyncReport {
        let export = export_path(self.repo_root);
        if let Some(parent) = export.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                return SyncReport::warn(format!("cannot prepare export dir: {err}"));
            }
        }

        // Fresh export so daemon-buffered writes cannot go stale.
        match self.runner.export(self.tracker_bin, &export, self.repo_root) {
            Ok(0) => {}
            Ok(exit_code) => {
                return SyncReport::warn(SyncError::ExportFailed { exit_code }.to_string());
            }
            Err(err) => return SyncReport::warn(format!("issue export failed: {err}")),
        }

        let jsonl = match fs::read_to_string(&export) {
            Ok(jsonl) => jsonl,
            Err(err) => {
                return SyncReport::warn(
                    SyncError::ReadExport {
                        reason: err.to_string(),
                    }
                    .to_string(),
                );
            }
        };

        let current = match hash_issues(&jsonl) {
            Ok(current) => current,
            Err(err) => return SyncReport::warn(err.to_string()),
        };

        let state_file = state_path(self.repo_root);
        let state = SyncState::load(&state_file);

        let (request, changed, deleted) = if state.needs_full() {
            (self.full_request(&jsonl, PROTOCOL_VERSION), current.len(), 0)
        } else {
            let changed: Vec<&String> = current
                .iter()
                .filter(|(id, line)| state.issue_hashes.get(*id) != Some(&line.hash))
                .map(|(id, _)| id)
                .collect();
            let deleted: Vec<String> = state
                .issue_hashes
                .keys()
                .filter(|id| !current.contains_key(*id))
                .cloned()
                .collect();
            if changed.is_empty() && deleted.is_empty() {
                return SyncReport {
                    skipped: true,
                    ..SyncReport::default()
                };
            }
            let changed_issues = changed
                .iter()
                .filter_map(|id| current.get(*id))
                .map(|line| line.value.clone())
                .collect();
            let request = SyncUploadRequest {
                workspace_id: self.workspace_id.to_string(),
                repo_id: self.repo_id.to_string(),
                alias: self.alias.to_string(),
                sync_mode: SyncMode::Incremental,
                issues_jsonl: None,
                changed_issues: Some(changed_issues),
                deleted_ids: Some(deleted.clone()),
                protocol_version: state.protocol_version,
            };
            (request, changed.len(), deleted.len())
        };

        let mode = request.sync_mode;
        let mut retried_full = false;
        let response = match self.api.sync_upload(&request) {
            Ok(response) => response,
            Err(ApiError::ProtocolMismatch { server_version }) => {
                // One retry, always full, at the server's version.
                retried_full = true;
                match self.api.sync_upload(&self.full_request(&jsonl, server_version)) {
                    Ok(response) => response,
                    Err(err) => {
                        return SyncReport {
                            retried_full,
                            warning: Some(format!("sync failed after full retry: {err}")),
                            ..SyncReport::default()
                        };
                    }
                }
            }
            Err(err) => return SyncReport::warn(format!("sync failed: {err}")),
        };

        let new_state = SyncState {
            protocol_version: response.sync_protocol_version,
            issue_hashes: current
                .into_iter()
                .map(|(id, line)| (id, line.hash))
                .collect(),
        };
        let mut warning = None;
        if let Err(err) = new_state.store(&state_file) {
            // Next run redoes a superset of this work.
            warning = Some(format!("cannot persist sync state: {err}"));
        }

        SyncReport {
            mode: Some(if retried_full { SyncMode::Full } else { mode }),
            changed,
            deleted,
            skipped: false,
            retried_full,
            warning,
        }
    }

    fn full_request(&self, jsonl: &str, protocol_version: u32) -> SyncUploadRequest {
        SyncUploadRequest {
            workspace_id: self.workspace_id.to_string(),
            repo_id: self.repo_id.to_string(),
            alias: self.alias.to_string(),
            sync_mode: SyncMode::Full,
            issues_jsonl: Some(jsonl.to_string()),
            changed_issues: None,
            deleted_ids: None,
            protocol_version,
        }
    }
}
