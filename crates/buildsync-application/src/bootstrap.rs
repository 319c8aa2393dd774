//! Composition root: configuration, persisted selection, backend and services.

use std::path::PathBuf;
use std::sync::Arc;

use buildsync_core::auth::AuthEvent;
use buildsync_core::backend::{
    AuthProvider, ChangeFeed, ChatMessageRepository, FunctionInvoker, ProjectRepository, RoleRepository,
    WorkspaceRepository,
};
use buildsync_core::config::BuildsyncConfig;
use buildsync_core::error::Result;
use buildsync_core::selection::SelectionRepository;
use buildsync_infrastructure::{
    BackendHandle, BuildsyncPaths, ConfigService, InMemoryBackend, SelectionStore,
};

use crate::chat_sync::ChatSyncService;
use crate::project_service::ProjectService;
use crate::role_resolver::SessionRoleResolver;
use crate::telemetry::init_tracing;
use crate::workspace_selection::WorkspaceSelectionService;

/// Startup state that does not need the network.
pub struct AppBootstrap {
    pub paths: BuildsyncPaths,
    pub config: BuildsyncConfig,
    pub selection: SelectionStore,
    pub backend: BackendHandle,
}

impl AppBootstrap {
    /// Loads configuration, installs tracing and restores the selection.
    ///
    /// The backend itself is built lazily; a missing URL or key surfaces as a
    /// `Config` error from `services`.
    pub async fn load(base_dir: Option<PathBuf>) -> Result<Self> {
        let paths = BuildsyncPaths::new(base_dir);
        let config = ConfigService::new(&paths)?.load()?;
        init_tracing(&config.log.level);

        let selection = SelectionStore::open(&paths).await?;
        let backend = BackendHandle::new(config.backend.clone());
        tracing::info!("[Bootstrap] Config directory: {:?}", paths.config_dir()?);

        Ok(Self {
            paths,
            config,
            selection,
            backend,
        })
    }

    /// Wires services against the hosted backend.
    ///
    /// `feed` is the realtime source chat caches subscribe to, typically a
    /// `ChangeFeedHub` that a transport publishes backend payloads into.
    pub fn services(&self, feed: Arc<dyn ChangeFeed>) -> Result<AppServices> {
        let rest = Arc::new(self.backend.get()?.clone());
        Ok(AppServices::from_ports(Ports {
            auth: rest.clone(),
            roles: rest.clone(),
            workspaces: rest.clone(),
            projects: rest.clone(),
            messages: rest.clone(),
            functions: rest,
            feed,
            selection: Arc::new(self.selection.clone()),
        }))
    }
}

/// Every port the services depend on.
pub struct Ports {
    pub auth: Arc<dyn AuthProvider>,
    pub roles: Arc<dyn RoleRepository>,
    pub workspaces: Arc<dyn WorkspaceRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub messages: Arc<dyn ChatMessageRepository>,
    pub functions: Arc<dyn FunctionInvoker>,
    pub feed: Arc<dyn ChangeFeed>,
    pub selection: Arc<dyn SelectionRepository>,
}

impl Ports {
    pub fn in_memory(backend: &InMemoryBackend, selection: Arc<dyn SelectionRepository>) -> Self {
        Self {
            auth: Arc::new(backend.clone()),
            roles: Arc::new(backend.clone()),
            workspaces: Arc::new(backend.clone()),
            projects: Arc::new(backend.clone()),
            messages: Arc::new(backend.clone()),
            functions: Arc::new(backend.clone()),
            feed: Arc::new(backend.clone()),
            selection,
        }
    }
}

/// The application services, sharing one identity state.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<dyn AuthProvider>,
    pub identity: SessionRoleResolver,
    pub workspaces: WorkspaceSelectionService,
    pub chat: ChatSyncService,
    pub projects: ProjectService,
}

impl AppServices {
    pub fn from_ports(ports: Ports) -> Self {
        let identity = SessionRoleResolver::new(ports.roles);
        let workspaces = WorkspaceSelectionService::new(
            ports.workspaces,
            ports.projects.clone(),
            ports.selection,
        );
        let chat = ChatSyncService::new(ports.messages, ports.feed);
        let projects = ProjectService::new(ports.projects, ports.functions, identity.clone());
        Self {
            auth: ports.auth,
            identity,
            workspaces,
            chat,
            projects,
        }
    }

    /// Installs the event's session for outgoing requests, resolves identity,
    /// then refreshes workspaces for a signed-in user or tears down per-user
    /// state on sign-out.
    pub async fn handle_auth_event(&self, event: AuthEvent) -> Result<()> {
        let user_id = event.user().map(|u| u.user_id.clone());
        self.auth.set_session(event.session().cloned()).await;
        self.identity.handle_event(event).await;

        match user_id {
            Some(user_id) => {
                self.workspaces.refresh(&user_id).await?;
            }
            None => {
                self.chat.select_project(None).await?;
                self.workspaces.clear_project().await;
            }
        }
        Ok(())
    }

    /// Selects a project everywhere: selection state and live chat.
    pub async fn open_project(&self, project_id: &str) -> Result<()> {
        self.workspaces.select_project(project_id).await?;
        self.chat.select_project(Some(project_id)).await
    }
}
