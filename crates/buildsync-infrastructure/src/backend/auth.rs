//! Session token storage and refresh against the auth endpoint.

use std::sync::Arc;

use buildsync_core::auth::{AuthSession, Session};
use buildsync_core::backend::AuthProvider;
use buildsync_core::error::{BuildsyncError, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

/// Sessions expiring within this margin are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Holds the current `AuthSession` and refreshes it on demand.
#[derive(Clone)]
pub struct RestAuthProvider {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl RestAuthProvider {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Bearer token for the next request: the session's access token,
    /// refreshed first if it is about to expire, or the anon key when signed
    /// out.
    pub async fn bearer_token(&self) -> Result<String> {
        let current = self.session.read().await.clone();
        match current {
            None => Ok(self.anon_key.clone()),
            Some(session)
                if session.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) =>
            {
                tracing::debug!("[Auth] Access token near expiry, refreshing");
                Ok(self.refresh_session().await?.access_token)
            }
            Some(session) => Ok(session.access_token),
        }
    }
}

#[async_trait::async_trait]
impl AuthProvider for RestAuthProvider {
    async fn current_session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    async fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or_else(|| BuildsyncError::auth("No session to refresh"))?;

        let url = format!("{}/auth/v1/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| BuildsyncError::auth(format!("Token refresh failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BuildsyncError::auth(format!(
                "Token refresh rejected ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BuildsyncError::auth(format!("Malformed token response: {}", e)))?;

        let refreshed = AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            user: Session::new(token.user.id, token.user.email.unwrap_or_default()),
        };
        *self.session.write().await = Some(refreshed.clone());
        tracing::info!("[Auth] Session refreshed for user {}", refreshed.user.user_id);
        Ok(refreshed)
    }
}
