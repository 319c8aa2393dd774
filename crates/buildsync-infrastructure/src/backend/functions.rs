//! Server-side function invocation.
//!
//! Functions answer with `{ "success": true, "data": ... }` or
//! `{ "error": "...", "code": "..." }`; both shapes may arrive with any HTTP
//! status.

use buildsync_core::backend::FunctionInvoker;
use buildsync_core::error::{BuildsyncError, Result};
use serde::Deserialize;
use serde_json::Value;

use super::rest::RestClient;

#[derive(Debug, Deserialize)]
struct FunctionEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl FunctionEnvelope {
    fn into_result(self, name: &str, status: reqwest::StatusCode) -> Result<Value> {
        if let Some(message) = self.error {
            return Err(BuildsyncError::mutation(message, self.code));
        }
        if self.success == Some(false) || !status.is_success() {
            return Err(BuildsyncError::mutation(
                format!("{} failed ({})", name, status),
                self.code,
            ));
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

#[derive(Clone)]
pub struct RestFunctionInvoker {
    client: RestClient,
}

impl RestFunctionInvoker {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl FunctionInvoker for RestFunctionInvoker {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        let token = self.client.auth().bearer_token().await?;
        let url = format!("{}/functions/v1/{}", self.client.base_url(), name);

        tracing::debug!("[Functions] Invoking {}", name);
        let response = self
            .client
            .http()
            .post(url)
            .header("apikey", self.client.anon_key())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| BuildsyncError::mutation(format!("{} unreachable: {}", name, e), None))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let envelope: FunctionEnvelope = serde_json::from_str(&text).map_err(|_| {
            BuildsyncError::mutation(format!("{} returned {}: {}", name, status, text), None)
        })?;

        let result = envelope.into_result(name, status);
        if let Err(err) = &result {
            tracing::warn!("[Functions] {} failed: {}", name, err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_success_envelope_returns_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/create-project"))
            .and(body_json(serde_json::json!({ "workspace_id": "w1", "name": "Tower" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "id": "p1", "workspace_id": "w1", "name": "Tower" }
            })))
            .mount(&server)
            .await;

        let invoker = RestFunctionInvoker::new(RestClient::new(reqwest::Client::new(), server.uri(), "anon"));
        let data = invoker
            .invoke("create-project", serde_json::json!({ "workspace_id": "w1", "name": "Tower" }))
            .await
            .unwrap();
        assert_eq!(data["id"], "p1");
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_mutation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/invite-member"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": "User is already a member",
                "code": "already_member"
            })))
            .mount(&server)
            .await;

        let invoker = RestFunctionInvoker::new(RestClient::new(reqwest::Client::new(), server.uri(), "anon"));
        let err = invoker
            .invoke("invite-member", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.inline_message(), "User is already a member");
        assert!(matches!(err, BuildsyncError::Mutation { code: Some(ref c), .. } if c == "already_member"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_mutation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let invoker = RestFunctionInvoker::new(RestClient::new(reqwest::Client::new(), server.uri(), "anon"));
        let err = invoker.invoke("create-project", serde_json::json!({})).await.unwrap_err();
        assert!(err.is_mutation());
    }
}
