//! Derives `{ user, role }` from authentication transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use buildsync_core::auth::{AuthEvent, IdentityState, Role, RoleGate, Session};
use buildsync_core::backend::RoleRepository;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A role lookup started by a sign-in style transition.
#[derive(Debug)]
pub struct PendingRole {
    generation: u64,
    user: Session,
}

/// Resolves the signed-in user's role on every auth transition.
///
/// State is published through a `watch` channel. Every transition bumps a
/// generation counter; a role fetch only lands if no transition happened
/// while it was in flight.
#[derive(Clone)]
pub struct SessionRoleResolver {
    roles: Arc<dyn RoleRepository>,
    state: Arc<watch::Sender<IdentityState>>,
    generation: Arc<AtomicU64>,
}

impl SessionRoleResolver {
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        let (state, _) = watch::channel(IdentityState::signed_out());
        Self {
            roles,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn current(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn gate(&self) -> RoleGate {
        self.state.borrow().gate()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    /// Handles one transition, waiting for the role fetch if one is needed.
    pub async fn handle_event(&self, event: AuthEvent) {
        if let Some(pending) = self.begin(event) {
            self.finish(pending).await;
        }
    }

    /// Applies the synchronous part of a transition.
    ///
    /// Sign-out clears the state here. Transitions carrying a user publish it
    /// and return the role lookup still to run.
    pub fn begin(&self, event: AuthEvent) -> Option<PendingRole> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(user) = event.user().cloned() else {
            tracing::info!("[RoleResolver] Session ended, clearing identity");
            self.state.send_replace(IdentityState::signed_out());
            return None;
        };

        tracing::debug!("[RoleResolver] {} for user {}", event_name(&event), user.user_id);
        self.state.send_modify(|state| {
            // Token refreshes keep the known role until the lookup answers.
            let same_user = state.user.as_ref().is_some_and(|u| u.user_id == user.user_id);
            if !same_user {
                state.role = None;
            }
            state.user = Some(user.clone());
        });
        Some(PendingRole { generation, user })
    }

    /// Fetches the role and publishes it unless a newer transition superseded it.
    pub async fn finish(&self, pending: PendingRole) {
        let role = self.fetch_role(&pending.user).await;

        let applied = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != pending.generation {
                return false;
            }
            if state.role == role {
                return false;
            }
            state.role = role;
            true
        });

        if self.generation.load(Ordering::SeqCst) != pending.generation {
            tracing::debug!(
                "[RoleResolver] Discarding stale role lookup for user {}",
                pending.user.user_id
            );
        } else if applied {
            tracing::info!(
                "[RoleResolver] User {} resolved to role {}",
                pending.user.user_id,
                role.map(|r| r.as_str()).unwrap_or("none")
            );
        }
    }

    /// Consumes auth events until the channel closes or `cancel` fires.
    ///
    /// Transitions are applied in arrival order; role lookups run concurrently
    /// and only the latest one can land.
    pub fn listen(
        &self,
        mut events: mpsc::UnboundedReceiver<AuthEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let resolver = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                if let Some(pending) = resolver.begin(event) {
                    let resolver = resolver.clone();
                    tokio::spawn(async move { resolver.finish(pending).await });
                }
            }
            tracing::debug!("[RoleResolver] Auth event listener stopped");
        })
    }

    async fn fetch_role(&self, user: &Session) -> Option<Role> {
        match self.roles.fetch_role(&user.user_id).await {
            Ok(Some(role)) => Some(role),
            Ok(None) => {
                tracing::warn!("[RoleResolver] No role row for user {}", user.user_id);
                None
            }
            Err(e) => {
                tracing::warn!(
                    "[RoleResolver] Failed to fetch role for user {}: {}",
                    user.user_id,
                    e
                );
                None
            }
        }
    }
}

fn event_name(event: &AuthEvent) -> &'static str {
    match event {
        AuthEvent::InitialSession(_) => "InitialSession",
        AuthEvent::SignedIn(_) => "SignedIn",
        AuthEvent::TokenRefreshed(_) => "TokenRefreshed",
        AuthEvent::SignedOut => "SignedOut",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use buildsync_core::auth::AuthSession;
    use buildsync_core::error::{BuildsyncError, Result};
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct MockRoles {
        roles: Mutex<HashMap<String, Role>>,
        fail: bool,
    }

    impl MockRoles {
        fn with(user_id: &str, role: Role) -> Self {
            let mut roles = HashMap::new();
            roles.insert(user_id.to_string(), role);
            Self {
                roles: Mutex::new(roles),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl RoleRepository for MockRoles {
        async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>> {
            if self.fail {
                return Err(BuildsyncError::fetch("connection reset"));
            }
            Ok(self.roles.lock().unwrap().get(user_id).copied())
        }
    }

    /// Blocks every lookup until released.
    struct GatedRoles {
        started: Notify,
        release: Notify,
        role: Role,
    }

    #[async_trait]
    impl RoleRepository for GatedRoles {
        async fn fetch_role(&self, _user_id: &str) -> Result<Option<Role>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Some(self.role))
        }
    }

    fn alice() -> AuthSession {
        AuthSession::new(
            Session::new("u1", "alice@site.io"),
            "access-1",
            "refresh-1",
            Utc::now() + Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_sign_in_resolves_role() {
        let resolver = SessionRoleResolver::new(Arc::new(MockRoles::with("u1", Role::ProjectManager)));
        resolver.handle_event(AuthEvent::SignedIn(alice())).await;

        let state = resolver.current();
        assert_eq!(state.user, Some(alice().user));
        assert_eq!(state.role, Some(Role::ProjectManager));
        assert!(resolver.gate().can_create_projects());
        assert!(!resolver.gate().can_remove_members());
    }

    #[tokio::test]
    async fn test_missing_row_yields_no_role() {
        let resolver = SessionRoleResolver::new(Arc::new(MockRoles::with("someone-else", Role::Admin)));
        resolver.handle_event(AuthEvent::InitialSession(Some(alice()))).await;

        let state = resolver.current();
        assert!(state.user.is_some());
        assert_eq!(state.role, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_no_role() {
        let roles = MockRoles {
            roles: Mutex::new(HashMap::new()),
            fail: true,
        };
        let resolver = SessionRoleResolver::new(Arc::new(roles));
        resolver.handle_event(AuthEvent::SignedIn(alice())).await;

        assert_eq!(resolver.current().role, None);
        assert!(resolver.gate().is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_out_clears_identity() {
        let resolver = SessionRoleResolver::new(Arc::new(MockRoles::with("u1", Role::Admin)));
        resolver.handle_event(AuthEvent::SignedIn(alice())).await;
        resolver.handle_event(AuthEvent::SignedOut).await;

        assert_eq!(resolver.current(), IdentityState::signed_out());
    }

    #[tokio::test]
    async fn test_initial_session_without_user_is_signed_out() {
        let resolver = SessionRoleResolver::new(Arc::new(MockRoles::with("u1", Role::Admin)));
        resolver.handle_event(AuthEvent::InitialSession(None)).await;
        assert!(!resolver.gate().is_signed_in());
    }

    #[tokio::test]
    async fn test_lookup_finishing_after_sign_out_is_discarded() {
        let roles = Arc::new(GatedRoles {
            started: Notify::new(),
            release: Notify::new(),
            role: Role::Admin,
        });
        let resolver = SessionRoleResolver::new(roles.clone());

        let signing_in = resolver.clone();
        let lookup = tokio::spawn(async move {
            signing_in.handle_event(AuthEvent::SignedIn(alice())).await;
        });
        roles.started.notified().await;

        resolver.handle_event(AuthEvent::SignedOut).await;
        assert_eq!(resolver.current(), IdentityState::signed_out());

        roles.release.notify_one();
        lookup.await.unwrap();
        assert_eq!(resolver.current(), IdentityState::signed_out());
    }

    #[tokio::test]
    async fn test_token_refresh_keeps_role_while_refetching() {
        let roles = Arc::new(GatedRoles {
            started: Notify::new(),
            release: Notify::new(),
            role: Role::Contractor,
        });
        let resolver = SessionRoleResolver::new(roles.clone());

        roles.release.notify_one();
        resolver.handle_event(AuthEvent::SignedIn(alice())).await;
        assert_eq!(resolver.current().role, Some(Role::Contractor));

        let pending = resolver.begin(AuthEvent::TokenRefreshed(alice())).unwrap();
        assert_eq!(resolver.current().role, Some(Role::Contractor));
        roles.release.notify_one();
        resolver.finish(pending).await;
        assert_eq!(resolver.current().role, Some(Role::Contractor));
    }

    #[tokio::test]
    async fn test_listener_applies_events_in_order() {
        let resolver = SessionRoleResolver::new(Arc::new(MockRoles::with("u1", Role::Client)));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = resolver.listen(rx, cancel.clone());
        let mut watcher = resolver.subscribe();

        tx.send(AuthEvent::SignedIn(alice())).unwrap();
        watcher
            .wait_for(|state| state.role == Some(Role::Client))
            .await
            .unwrap();

        tx.send(AuthEvent::SignedOut).unwrap();
        watcher.wait_for(|state| state.user.is_none()).await.unwrap();

        cancel.cancel();
        handle.await.unwrap();
    }
}
