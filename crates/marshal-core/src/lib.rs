pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod intercept;
pub mod invocation;
pub mod related;
pub mod reserve;
pub mod runner;
pub mod sync;

pub use crate::api::CoordinationApi;
pub use crate::config::CoordinationConfig;
pub use crate::error::MarshalError;
pub use crate::intercept::{InterceptOutcome, Interceptor};
pub use crate::invocation::CommandInvocation;
pub use crate::runner::{ProcessRunner, SystemRunner};
