//! Hosted backend adapters.
//!
//! - `rest`: PostgREST-style row queries and mutations
//! - `auth`: session token storage and refresh
//! - `functions`: server-side function invocation
//! - `repositories`: port implementations over the REST client
//! - `handle`: lazily constructed backend from configuration
//! - `feed_hub`: in-process change-feed fan-out
//! - `memory`: in-memory backend for tests and offline demos

pub mod auth;
pub mod feed_hub;
pub mod functions;
pub mod handle;
pub mod memory;
pub mod repositories;
pub mod rest;

pub use auth::RestAuthProvider;
pub use feed_hub::ChangeFeedHub;
pub use functions::RestFunctionInvoker;
pub use handle::BackendHandle;
pub use memory::InMemoryBackend;
pub use repositories::RestBackend;
pub use rest::{Filter, Order, RestClient};

/// Table names used by the client.
pub mod tables {
    pub const USER_ROLES: &str = "user_roles";
    pub const WORKSPACES: &str = "workspaces";
    pub const WORKSPACE_MEMBERS: &str = "workspace_members";
    pub const PROJECTS: &str = "projects";
    pub const PROJECT_MEMBERS: &str = "project_members";
    pub const CHAT_MESSAGES: &str = "chat_messages";
}

/// Server-side function names.
pub mod function_names {
    pub const CREATE_PROJECT: &str = "create-project";
    pub const INVITE_MEMBER: &str = "invite-member";
}
