//! [`SyncTransport`] over `reqwest`, talking to the endpoint table
//! `anchor-sync-server` exposes. Identity is carried out of band as a
//! bearer JWT, never in a request body.

use std::fmt;

use anchor_sync::{
    ChecksumMeta, CleanupRequest, DisableAction, PullPage, PullQuery, PushRequest, PushResponse,
    SyncSettingsDto, SyncTransport, TransportError, VaultEnableRequest, VaultEnvelope, VaultStatus,
    VerifyPlaintextResponse,
};
use reqwest::{Client, StatusCode};
use serde::Serialize;

/// Talks to one `anchor-sync-server` deployment on behalf of one signed-in user.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), token: token.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, TransportError> {
        let mut request = self.client.request(method, self.url(path)).bearer_auth(&self.token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| TransportError::Transient(err.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TransportError::Unauthorized),
            StatusCode::CONFLICT => {
                let conflicts = response.json().await.map_err(|err| TransportError::Transient(err.to_string()))?;
                Err(TransportError::Conflict(conflicts))
            },
            status if status.is_client_error() => {
                let message = response.text().await.unwrap_or_default();
                Err(TransportError::Rejected(message))
            },
            status if status.is_server_error() => {
                let message = response.text().await.unwrap_or_default();
                Err(TransportError::Transient(message))
            },
            _ => Ok(response),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        response.json().await.map_err(|err| TransportError::Transient(err.to_string()))
    }
}

impl SyncTransport for HttpTransport {
    async fn push_plaintext(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        let response = self.send(reqwest::Method::POST, "/sync/plaintext/push", Some(&request), &[]).await?;
        Self::decode(response).await
    }

    async fn pull_plaintext(&self, query: PullQuery) -> Result<PullPage, TransportError> {
        let params = [("limit", query.limit.to_string())];
        let response = self
            .send::<()>(reqwest::Method::GET, "/sync/plaintext/pull", None, &with_cursor(&params, query.cursor))
            .await?;
        Self::decode(response).await
    }

    async fn plaintext_checksum(&self) -> Result<ChecksumMeta, TransportError> {
        let response = self.send::<()>(reqwest::Method::GET, "/sync/plaintext/checksum", None, &[]).await?;
        Self::decode(response).await
    }

    async fn push_encrypted(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        let response = self.send(reqwest::Method::POST, "/sync/encrypted/push", Some(&request), &[]).await?;
        Self::decode(response).await
    }

    async fn pull_encrypted(&self, query: PullQuery) -> Result<PullPage, TransportError> {
        let params = [("limit", query.limit.to_string())];
        let response = self
            .send::<()>(reqwest::Method::GET, "/sync/encrypted/pull", None, &with_cursor(&params, query.cursor))
            .await?;
        Self::decode(response).await
    }

    async fn get_settings(&self) -> Result<SyncSettingsDto, TransportError> {
        let response = self.send::<()>(reqwest::Method::GET, "/sync/settings", None, &[]).await?;
        Self::decode(response).await
    }

    async fn put_settings(&self, settings: SyncSettingsDto) -> Result<SyncSettingsDto, TransportError> {
        let response = self.send(reqwest::Method::PUT, "/sync/settings", Some(&settings), &[]).await?;
        Self::decode(response).await
    }

    async fn get_vault(&self) -> Result<VaultStatus, TransportError> {
        let response = self.send::<()>(reqwest::Method::GET, "/vault", None, &[]).await?;
        Self::decode(response).await
    }

    async fn put_vault_envelope(&self, envelope: VaultEnvelope) -> Result<(), TransportError> {
        self.send(reqwest::Method::PUT, "/vault/envelope", Some(&envelope), &[]).await?;
        Ok(())
    }

    async fn enable_vault(&self, request: VaultEnableRequest) -> Result<(), TransportError> {
        self.send(reqwest::Method::POST, "/vault/enable", Some(&request), &[]).await?;
        Ok(())
    }

    async fn disable_vault_action(&self, action: DisableAction) -> Result<(), TransportError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            action: DisableAction,
        }
        self.send(reqwest::Method::POST, "/vault/disable", Some(&Body { action }), &[]).await?;
        Ok(())
    }

    async fn verify_plaintext(&self, expected_count: usize) -> Result<VerifyPlaintextResponse, TransportError> {
        let params = [("expectedCount", expected_count.to_string())];
        let response =
            self.send::<()>(reqwest::Method::GET, "/vault/disable/verify-plaintext", None, &params).await?;
        Self::decode(response).await
    }

    async fn disable_cleanup(&self, request: CleanupRequest) -> Result<(), TransportError> {
        self.send(reqwest::Method::POST, "/vault/disable/cleanup", Some(&request), &[]).await?;
        Ok(())
    }
}

fn with_cursor<'a>(
    base: &'a [(&'a str, String)],
    cursor: Option<chrono::DateTime<chrono::Utc>>,
) -> Vec<(&'a str, String)> {
    let mut params = base.to_vec();
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor.to_rfc3339()));
    }
    params
}
