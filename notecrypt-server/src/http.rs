//! HTTP API: encryption profile and note routes.

use crate::db::Database;
use crate::error::{ServerError, ServerResult};
use crate::note_store::NoteStore;
use crate::profile_store::ProfileStore;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use notecrypt_types::{
    AccountId, HistoryEntry, InitializeProfileRequest, NoteId, NotePage, NoteQuery,
    ProvisionKeyRequest, UserEncryptionProfile, WireNote,
};
use tracing::debug;

/// Header carrying the caller's account id, set by the authentication layer
/// in front of this service.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiles: ProfileStore,
    pub notes: NoteStore,
    /// Whether `POST /api/users/encryption/reset` is served.
    pub allow_reset: bool,
}

impl AppState {
    pub fn new(db: Database, allow_reset: bool) -> Self {
        Self {
            profiles: ProfileStore::new(db.clone()),
            notes: NoteStore::new(db),
            allow_reset,
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Account(pub AccountId);

impl<S: Send + Sync> FromRequestParts<S> for Account {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ServerError::Unauthorized)?;
        AccountId::parse(header.trim())
            .map(Account)
            .map_err(|_| ServerError::Unauthorized)
    }
}

/// Runs a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Task(e.to_string()))?
}

fn parse_note_id(raw: &str) -> ServerResult<NoteId> {
    NoteId::parse(raw).map_err(|_| ServerError::BadRequest(format!("invalid note id: {raw}")))
}

// ── Profile ──

async fn get_profile(
    State(state): State<AppState>,
    Account(account): Account,
) -> ServerResult<Json<UserEncryptionProfile>> {
    blocking(move || state.profiles.get(account)).await.map(Json)
}

async fn initialize_profile(
    State(state): State<AppState>,
    Account(account): Account,
    Json(request): Json<InitializeProfileRequest>,
) -> ServerResult<Json<UserEncryptionProfile>> {
    blocking(move || state.profiles.initialize(account, &request))
        .await
        .map(Json)
}

async fn provision_stable_key(
    State(state): State<AppState>,
    Account(account): Account,
    Json(request): Json<ProvisionKeyRequest>,
) -> ServerResult<Json<UserEncryptionProfile>> {
    blocking(move || {
        state
            .profiles
            .provision_stable_key(account, request.encryption_key.as_deref())
    })
    .await
    .map(Json)
}

async fn reset_profile(
    State(state): State<AppState>,
    Account(account): Account,
) -> ServerResult<StatusCode> {
    if !state.allow_reset {
        return Err(ServerError::ResetDisabled);
    }
    blocking(move || state.profiles.reset(account)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Notes ──

async fn list_notes(
    State(state): State<AppState>,
    Account(account): Account,
    Query(query): Query<NoteQuery>,
) -> ServerResult<Json<NotePage>> {
    debug!(%account, page = query.page, limit = query.limit, "listing notes");
    blocking(move || state.notes.list(account, &query))
        .await
        .map(Json)
}

async fn create_note(
    State(state): State<AppState>,
    Account(account): Account,
    Json(note): Json<WireNote>,
) -> ServerResult<impl IntoResponse> {
    let note = blocking(move || state.notes.create(account, note)).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note(
    State(state): State<AppState>,
    Account(account): Account,
    Path(id): Path<String>,
) -> ServerResult<Json<WireNote>> {
    let id = parse_note_id(&id)?;
    blocking(move || state.notes.get(account, id)).await.map(Json)
}

async fn update_note(
    State(state): State<AppState>,
    Account(account): Account,
    Path(id): Path<String>,
    Json(note): Json<WireNote>,
) -> ServerResult<Json<WireNote>> {
    let id = parse_note_id(&id)?;
    blocking(move || state.notes.update(account, id, note))
        .await
        .map(Json)
}

async fn delete_note(
    State(state): State<AppState>,
    Account(account): Account,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    let id = parse_note_id(&id)?;
    blocking(move || state.notes.delete(account, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn note_history(
    State(state): State<AppState>,
    Account(account): Account,
    Path(id): Path<String>,
) -> ServerResult<Json<Vec<HistoryEntry>>> {
    let id = parse_note_id(&id)?;
    blocking(move || state.notes.history(account, id))
        .await
        .map(Json)
}

async fn restore_version(
    State(state): State<AppState>,
    Account(account): Account,
    Path((id, version)): Path<(String, u32)>,
) -> ServerResult<Json<WireNote>> {
    let id = parse_note_id(&id)?;
    blocking(move || state.notes.restore(account, id, version))
        .await
        .map(Json)
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users/encryption",
            get(get_profile).patch(initialize_profile),
        )
        .route("/api/users/encryption/stable-key", post(provision_stable_key))
        .route("/api/users/encryption/reset", post(reset_profile))
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
        .route("/api/notes/{id}/history", get(note_history))
        .route("/api/notes/{id}/restore/{version}", post(restore_version))
        .with_state(state)
}
