//! HTTP implementation of the server API.

use crate::api::{NoteApi, ProfileApi};
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use notecrypt_types::{
    AccountId, ErrorBody, HistoryEntry, InitializeProfileRequest, NoteId, NotePage, NoteQuery,
    ProvisionKeyRequest, UserEncryptionProfile, WireNote, ALREADY_INITIALIZED,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Header carrying the authenticated account, set by the auth layer.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// reqwest-backed client for one account.
#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    account: AccountId,
}

impl HttpApiClient {
    /// Creates a client acting as `account`.
    pub fn new(config: &ApiConfig, account: AccountId) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account,
        })
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> SyncResult<Response> {
        let response = request
            .header(ACCOUNT_HEADER, self.account.to_string())
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("{what} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        debug!(%status, what, "request rejected");

        Err(match status {
            StatusCode::NOT_FOUND => SyncError::NotFound(message),
            StatusCode::BAD_REQUEST if message == ALREADY_INITIALIZED => {
                SyncError::AlreadyInitialized
            }
            _ => SyncError::Http {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> SyncResult<T> {
        let response = self.send(request, what).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("{what} failed: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Deletes the account's encryption profile. Destructive: notes
    /// encrypted under the old key become unreadable.
    pub async fn reset_profile(&self) -> SyncResult<()> {
        self.send(
            self.client.post(self.url("/users/encryption/reset")),
            "profile reset",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileApi for HttpApiClient {
    async fn get_profile(&self) -> SyncResult<UserEncryptionProfile> {
        self.send_json(
            self.client.get(self.url("/users/encryption")),
            "profile fetch",
        )
        .await
    }

    async fn initialize_profile(
        &self,
        request: &InitializeProfileRequest,
    ) -> SyncResult<UserEncryptionProfile> {
        self.send_json(
            self.client.patch(self.url("/users/encryption")).json(request),
            "profile initialization",
        )
        .await
    }

    async fn provision_stable_key(
        &self,
        proposed: Option<&str>,
    ) -> SyncResult<UserEncryptionProfile> {
        let body = ProvisionKeyRequest {
            encryption_key: proposed.map(str::to_string),
        };
        self.send_json(
            self.client
                .post(self.url("/users/encryption/stable-key"))
                .json(&body),
            "stable key provisioning",
        )
        .await
    }
}

#[async_trait]
impl NoteApi for HttpApiClient {
    async fn create_note(&self, note: &WireNote) -> SyncResult<WireNote> {
        self.send_json(self.client.post(self.url("/notes")).json(note), "note create")
            .await
    }

    async fn update_note(&self, id: NoteId, note: &WireNote) -> SyncResult<WireNote> {
        self.send_json(
            self.client.put(self.url(&format!("/notes/{id}"))).json(note),
            "note update",
        )
        .await
    }

    async fn get_note(&self, id: NoteId) -> SyncResult<WireNote> {
        self.send_json(
            self.client.get(self.url(&format!("/notes/{id}"))),
            "note fetch",
        )
        .await
    }

    async fn list_notes(&self, query: &NoteQuery) -> SyncResult<NotePage> {
        self.send_json(
            self.client.get(self.url("/notes")).query(query),
            "note list",
        )
        .await
    }

    async fn delete_note(&self, id: NoteId) -> SyncResult<()> {
        self.send(
            self.client.delete(self.url(&format!("/notes/{id}"))),
            "note delete",
        )
        .await?;
        Ok(())
    }

    async fn note_history(&self, id: NoteId) -> SyncResult<Vec<HistoryEntry>> {
        self.send_json(
            self.client.get(self.url(&format!("/notes/{id}/history"))),
            "note history",
        )
        .await
    }

    async fn restore_version(&self, id: NoteId, version: u32) -> SyncResult<WireNote> {
        self.send_json(
            self.client
                .post(self.url(&format!("/notes/{id}/restore/{version}"))),
            "note restore",
        )
        .await
    }
}
