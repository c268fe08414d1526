//! Client for the remote sandbox service.
//!
//! [`ApiClient`] owns transport, authentication and retries. Resource
//! wrappers borrow it: `client.sandboxes()`, `client.files()`,
//! `client.commands()`, `client.envs()`, `client.billing()` and
//! `client.templates()`.

pub mod account;
pub mod billing;
pub mod client;
pub mod commands;
pub mod envs;
pub mod error;
pub mod files;
pub mod sandboxes;
pub mod templates;

pub use account::UserInfo;
pub use billing::{UsageItem, UsageReport};
pub use client::{API_KEY_HEADER, ApiAuth, ApiClient, ApiClientBuilder, RetryPolicy};
pub use commands::{CommandResult, ProcessInfo, RunCommand, StreamEvent};
pub use envs::{parse_assignment, validate_env_name};
pub use error::{ApiError, ApiResult};
pub use files::{EntryInfo, EntryKind};
pub use sandboxes::{CreateSandbox, MetricSample, Sandbox, SandboxHealth, SandboxState};
pub use templates::{BuildInfo, BuildState, BuildStatus, StartBuild, Template, pack_context};
