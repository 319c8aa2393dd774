//! Session and role domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user as seen by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Token material for an authenticated session.
///
/// Used to authorise REST calls and server-side function invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Session,
}

impl AuthSession {
    pub fn new(
        user: Session,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            user,
        }
    }

    /// Returns true if the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - now <= margin
    }
}

/// Authentication state transitions delivered by the auth subsystem.
///
/// Transitions that start or renew a session carry its token material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Session restored at startup, if any.
    InitialSession(Option<AuthSession>),
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

impl AuthEvent {
    /// The session carried by this transition, or `None` when it ends one.
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthEvent::InitialSession(session) => session.as_ref(),
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }

    /// The user carried by this transition, or `None` when it ends the session.
    pub fn user(&self) -> Option<&Session> {
        self.session().map(|session| &session.user)
    }
}

/// A user's role, looked up per session from the `user_roles` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ProjectManager,
    Contractor,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProjectManager => "project_manager",
            Role::Contractor => "contractor",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
