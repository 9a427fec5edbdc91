use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata reason marking a reservation as maintained by the
/// reconciler. Reservations carrying any other reason (or another
/// holder) are never touched automatically.
pub const AUTO_RESERVE_REASON: &str = "auto-reserve";

/// A unit of work some workspace currently claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkItem {
    #[serde(rename = "beadID")]
    pub bead_id: String,
    #[serde(rename = "workspaceID")]
    pub workspace_id: String,
    pub alias: String,
    #[serde(rename = "humanName")]
    pub human_name: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightRequest {
    #[serde(rename = "workspaceID")]
    pub workspace_id: String,
    #[serde(rename = "repoID")]
    pub repo_id: String,
    pub alias: String,
    #[serde(rename = "humanName")]
    pub human_name: String,
    #[serde(rename = "repoOrigin")]
    pub repo_origin: String,
    pub role: String,
    #[serde(rename = "commandLine")]
    pub command_line: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreflightContext {
    #[serde(rename = "beadsInProgress", default)]
    pub beads_in_progress: Vec<WorkItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightResponse {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub context: PreflightContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUploadRequest {
    #[serde(rename = "workspaceID")]
    pub workspace_id: String,
    #[serde(rename = "repoID")]
    pub repo_id: String,
    pub alias: String,
    #[serde(rename = "syncMode")]
    pub sync_mode: SyncMode,
    #[serde(rename = "issuesJSONL", skip_serializing_if = "Option::is_none")]
    pub issues_jsonl: Option<String>,
    #[serde(rename = "changedIssues", skip_serializing_if = "Option::is_none")]
    pub changed_issues: Option<Vec<serde_json::Value>>,
    #[serde(rename = "deletedIDs", skip_serializing_if = "Option::is_none")]
    pub deleted_ids: Option<Vec<String>>,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUploadResponse {
    pub synced: bool,
    #[serde(rename = "issuesCount", default)]
    pub issues_count: u64,
    #[serde(default)]
    pub stats: Option<serde_json::Value>,
    #[serde(rename = "syncProtocolVersion")]
    pub sync_protocol_version: u32,
}

/// A time-bounded exclusive claim on one repository path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    #[serde(rename = "resourceKey")]
    pub resource_key: String,
    #[serde(rename = "holderAlias")]
    pub holder_alias: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "metadataReason", default)]
    pub reason: String,
}

impl ReservationRecord {
    pub fn is_auto_managed(&self) -> bool {
        self.reason == AUTO_RESERVE_REASON
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationMetadata {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireRequest {
    pub alias: String,
    #[serde(rename = "resourceKey")]
    pub resource_key: String,
    #[serde(rename = "ttlSeconds")]
    pub ttl_seconds: u64,
    pub metadata: ReservationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewRequest {
    pub alias: String,
    #[serde(rename = "resourceKey")]
    pub resource_key: String,
    #[serde(rename = "ttlSeconds")]
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub alias: String,
    #[serde(rename = "resourceKey")]
    pub resource_key: String,
}

/// Direct note to another workspace, used after an override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyRequest {
    #[serde(rename = "toWorkspaceID")]
    pub to_workspace_id: String,
    #[serde(rename = "fromAlias")]
    pub from_alias: String,
    #[serde(rename = "fromHumanName")]
    pub from_human_name: String,
    #[serde(rename = "beadID")]
    pub bead_id: String,
    pub message: String,
}

/// Client-observable contract of the remote coordination service.
///
/// `marshal-client` implements this over HTTP; tests swap in fakes.
pub trait CoordinationApi {
    fn preflight(&self, request: &PreflightRequest) -> Result<PreflightResponse, ApiError>;
    fn sync_upload(&self, request: &SyncUploadRequest) -> Result<SyncUploadResponse, ApiError>;
    fn list_reservations(&self, repo_id: &str) -> Result<Vec<ReservationRecord>, ApiError>;
    fn acquire_reservation(&self, request: &AcquireRequest) -> Result<ReservationRecord, ApiError>;
    fn renew_reservation(&self, request: &RenewRequest) -> Result<(), ApiError>;
    fn release_reservation(&self, request: &ReleaseRequest) -> Result<(), ApiError>;
    fn notify(&self, request: &NotifyRequest) -> Result<(), ApiError>;
}
