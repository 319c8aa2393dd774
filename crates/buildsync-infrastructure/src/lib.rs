pub mod backend;
pub mod config_service;
pub mod paths;
pub mod selection_store;
pub mod storage;

pub use crate::backend::{BackendHandle, ChangeFeedHub, InMemoryBackend, RestBackend};
pub use crate::config_service::ConfigService;
pub use crate::paths::BuildsyncPaths;
pub use crate::selection_store::SelectionStore;
