//! Blocking HTTP implementation of the coordination service contract.
//!
//! All policy lives on the server and in `marshal-core`; this crate
//! only moves typed requests over the wire and maps transport and
//! status failures onto [`ApiError`].

use marshal_core::api::{
    AcquireRequest, CoordinationApi, NotifyRequest, PreflightRequest, PreflightResponse,
    ReleaseRequest, RenewRequest, ReservationRecord, SyncUploadRequest, SyncUploadResponse,
};
use marshal_core::error::ApiError;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct HttpCoordinator {
    client: Client,
    base_url: String,
}

impl HttpCoordinator {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| ApiError::Unreachable {
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(transport_error)
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, ApiError> {
        self.client
            .get(self.url(path))
            .query(query)
            .send()
            .map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::Unreachable {
        reason: err.to_string(),
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json().map_err(|err| ApiError::Decode {
        reason: err.to_string(),
    })
}

/// Shared status mapping: 410 means the workspace registration was
/// dropped server-side, everything else non-success is an opaque
/// status failure.
fn check_status(response: Response) -> Result<Response, ApiError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::GONE => Err(ApiError::Gone),
        status => Err(ApiError::Status {
            code: status.as_u16(),
        }),
    }
}

#[derive(Deserialize)]
struct ProtocolConflictBody {
    #[serde(rename = "syncProtocolVersion")]
    sync_protocol_version: u32,
}

#[derive(Deserialize)]
struct ReservationConflictBody {
    #[serde(rename = "holderAlias")]
    holder_alias: String,
    #[serde(rename = "expiresAt")]
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl CoordinationApi for HttpCoordinator {
    fn preflight(&self, request: &PreflightRequest) -> Result<PreflightResponse, ApiError> {
        let response = check_status(self.post("/api/preflight", request)?)?;
        decode(response)
    }

    fn sync_upload(&self, request: &SyncUploadRequest) -> Result<SyncUploadResponse, ApiError> {
        let response = self.post("/api/sync", request)?;
        if response.status() == StatusCode::CONFLICT {
            let body: ProtocolConflictBody = decode(response)?;
            return Err(ApiError::ProtocolMismatch {
                server_version: body.sync_protocol_version,
            });
        }
        decode(check_status(response)?)
    }

    fn list_reservations(&self, repo_id: &str) -> Result<Vec<ReservationRecord>, ApiError> {
        let response = check_status(self.get("/api/reservations", &[("repoID", repo_id)])?)?;
        decode(response)
    }

    fn acquire_reservation(&self, request: &AcquireRequest) -> Result<ReservationRecord, ApiError> {
        let response = self.post("/api/reservations/acquire", request)?;
        if response.status() == StatusCode::CONFLICT {
            let body: ReservationConflictBody = decode(response)?;
            return Err(ApiError::ReservationHeld {
                holder: body.holder_alias,
                expires_at: body.expires_at,
            });
        }
        decode(check_status(response)?)
    }

    fn renew_reservation(&self, request: &RenewRequest) -> Result<(), ApiError> {
        check_status(self.post("/api/reservations/renew", request)?)?;
        Ok(())
    }

    fn release_reservation(&self, request: &ReleaseRequest) -> Result<(), ApiError> {
        check_status(self.post("/api/reservations/release", request)?)?;
        Ok(())
    }

    fn notify(&self, request: &NotifyRequest) -> Result<(), ApiError> {
        check_status(self.post("/api/notify", request)?)?;
        Ok(())
    }
}
