//! Application services for the Buildsync client.
//!
//! Each service owns its state behind `Arc` and is cheap to clone; the
//! `bootstrap` module wires them to either the hosted or the in-memory
//! backend.

pub mod bootstrap;
pub mod chat_sync;
pub mod project_service;
pub mod role_resolver;
pub mod telemetry;
pub mod workspace_selection;

pub use bootstrap::{AppBootstrap, AppServices, Ports};
pub use chat_sync::ChatSyncService;
pub use project_service::ProjectService;
pub use role_resolver::{PendingRole, SessionRoleResolver};
pub use telemetry::init_tracing;
pub use workspace_selection::WorkspaceSelectionService;
