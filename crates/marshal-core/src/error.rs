use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config at {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("cannot parse config at {path}: {reason}")]
    Parse { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("io error while running {program}: {reason}")]
    Io { program: String, reason: String },
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("empty invocation")]
    Empty,
    #[error("--:jump-in requires a message")]
    OverrideMissingMessage,
    #[error("--:local-config requires a path")]
    LocalConfigMissingPath,
}

/// Client-observable failures of the coordination service.
///
/// The interceptor maps these onto the blocking/non-blocking policy:
/// only `Gone` is fatal, `ReservationHeld` is per-path data, and the
/// rest degrade to warnings.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("coordination service unreachable: {reason}")]
    Unreachable { reason: String },
    #[error("workspace registration is gone; re-register this agent")]
    Gone,
    #[error("coordination service returned status {code}")]
    Status { code: u16 },
    #[error("sync protocol mismatch, server at version {server_version}")]
    ProtocolMismatch { server_version: u32 },
    #[error("reservation held by {holder} until {expires_at}")]
    ReservationHeld {
        holder: String,
        expires_at: DateTime<Utc>,
    },
    #[error("cannot decode response: {reason}")]
    Decode { reason: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("issue export failed with exit code {exit_code}")]
    ExportFailed { exit_code: i32 },
    #[error("cannot read issue export: {reason}")]
    ReadExport { reason: String },
    #[error("issue record missing id: {line}")]
    MissingId { line: String },
}

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("workspace registration is gone; run setup again to re-register")]
    IdentityGone,
}

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Intercept(#[from] InterceptError),
    #[error("internal error: {message}")]
    Internal { message: String },
}
