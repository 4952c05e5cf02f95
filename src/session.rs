//! Credential and identity lifecycle.
//!
//! `SessionStore` is the single source of truth for "am I authenticated, and
//! as whom". It owns the one piece of persisted local state (the bearer token
//! file) and hands out cloned snapshots; nothing else mutates a `Session`.
//!
//! Restore is two-phase: an optimistic local decode of the token claims gives
//! an immediate Pending identity without a loading round-trip, then a single
//! profile refresh confirms or discards it. Decode-only state is never treated
//! as trusted identity; the server response always overrides it.

use crate::api_client::FraudServiceClient;
use crate::errors::{ClientError, ResultExt};
use crate::models::{Session, SessionStatus};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Claims this client reads from a bearer token payload. The token is decoded
/// without signature verification; only the server's acceptance makes it
/// trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

/// Decodes the payload segment of a JWT-shaped token. Returns `None` for
/// anything that is not three dot-separated segments with a base64url JSON
/// payload carrying `sub` and `exp`.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    segments.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Persists exactly one item: the raw bearer token, at a fixed path.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the persisted token; a missing file is simply no token.
    pub fn load(&self) -> Result<Option<String>, ClientError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim().to_string();
                Ok(if token.is_empty() { None } else { Some(token) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("reading persisted token"),
        }
    }

    pub fn save(&self, token: &str) -> Result<(), ClientError> {
        Ok(std::fs::write(&self.path, token)?)
    }

    /// Removes the persisted token; already-absent is fine.
    pub fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("clearing persisted token"),
        }
    }
}

/// Owns the session; see the module docs for the lifecycle rules.
pub struct SessionStore {
    token_store: FileTokenStore,
    state: RwLock<Session>,
    /// Bumped on every login/logout/invalidate so a stale refresh resolution
    /// can detect that the world moved on and discard itself.
    epoch: AtomicU64,
}

impl SessionStore {
    pub fn new(token_store: FileTokenStore) -> Self {
        Self {
            token_store,
            state: RwLock::new(Session::unauthenticated()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Immutable snapshot of the current session.
    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    /// The bearer token to attach to authenticated calls, if any.
    pub async fn current_token(&self) -> Option<String> {
        let state = self.state.read().await;
        match state.status {
            SessionStatus::Pending | SessionStatus::Authenticated if !state.raw_token.is_empty() => {
                Some(state.raw_token.clone())
            }
            _ => None,
        }
    }

    /// Status with wall-clock expiry applied: an Authenticated session whose
    /// embedded expiry has passed reports Expired without waiting for the
    /// server to reject it.
    pub async fn status_now(&self) -> SessionStatus {
        let state = self.state.read().await;
        if state.status == SessionStatus::Authenticated && state.expires_at < Utc::now() {
            SessionStatus::Expired
        } else {
            state.status
        }
    }

    /// Restores a persisted session on startup.
    ///
    /// Finds a persisted token, decodes it locally, and if the expiry claim
    /// is still in the future issues exactly one profile refresh to confirm
    /// identity. Any refresh failure (network or rejection) discards the
    /// token. Storage failures are the only errors surfaced; a refresh
    /// failure resolves to an Unauthenticated session, not an `Err`.
    pub async fn restore(&self, client: &FraudServiceClient) -> Result<Session, ClientError> {
        let Some(token) = self.token_store.load()? else {
            return Ok(self.snapshot().await);
        };

        let claims = match decode_claims(&token) {
            Some(claims) if !claims.sub.is_empty() => claims,
            _ => {
                tracing::warn!("Persisted token is not decodable, discarding");
                self.token_store.clear()?;
                return Ok(self.snapshot().await);
            }
        };

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if expires_at < Utc::now() {
            tracing::info!("Persisted token expired at {}, discarding", expires_at);
            self.token_store.clear()?;
            return Ok(self.snapshot().await);
        }

        // Optimistic phase: decoded claims give an immediate Pending identity.
        let epoch = self.epoch.load(Ordering::SeqCst);
        {
            let mut state = self.state.write().await;
            *state = Session {
                raw_token: token.clone(),
                subject_id: claims.sub.clone(),
                agency_id: String::new(),
                agency_name: String::new(),
                expires_at,
                status: SessionStatus::Pending,
            };
        }

        // Confirmation phase: the server is the source of truth for identity.
        match client.fetch_profile().await {
            Ok(profile) => {
                let mut state = self.state.write().await;
                if self.epoch.load(Ordering::SeqCst) != epoch
                    || state.status != SessionStatus::Pending
                    || state.raw_token != token
                {
                    tracing::warn!("Discarding stale profile refresh result");
                    return Ok(state.clone());
                }
                state.subject_id = profile.id;
                state.agency_name = profile.display_name;
                state.status = SessionStatus::Authenticated;
                tracing::info!("Session restored for subject {}", state.subject_id);
                Ok(state.clone())
            }
            Err(e) => {
                let mut state = self.state.write().await;
                if self.epoch.load(Ordering::SeqCst) != epoch
                    || state.status != SessionStatus::Pending
                    || state.raw_token != token
                {
                    // Either superseded by a login/logout, or the 401 path
                    // already invalidated the session for us.
                    return Ok(state.clone());
                }
                tracing::warn!("Profile refresh failed ({}), discarding token", e);
                self.token_store.clear()?;
                *state = Session::unauthenticated();
                Ok(state.clone())
            }
        }
    }

    /// Establishes an authenticated session from a login response. The login
    /// payload already carries the agency identity, so no extra round-trip.
    pub async fn login(
        &self,
        token: &str,
        agency_id: &str,
        agency_name: &str,
    ) -> Result<Session, ClientError> {
        let claims = decode_claims(token)
            .filter(|c| !c.sub.is_empty())
            .ok_or_else(|| {
                ClientError::Auth("login returned a token without usable claims".to_string())
            })?;

        self.token_store.save(token)?;
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.write().await;
        *state = Session {
            raw_token: token.to_string(),
            subject_id: claims.sub,
            agency_id: agency_id.to_string(),
            agency_name: agency_name.to_string(),
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            status: SessionStatus::Authenticated,
        };
        tracing::info!("Logged in as {} ({})", state.subject_id, state.agency_name);
        Ok(state.clone())
    }

    /// Ends the session. The server notification is best effort: its failure
    /// is logged and never blocks the local logout.
    pub async fn logout(&self, client: &FraudServiceClient) -> Result<(), ClientError> {
        if let Err(e) = client.notify_logout().await {
            tracing::warn!("Server logout notification failed (ignored): {}", e);
        }

        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.token_store.clear()?;
        let mut state = self.state.write().await;
        *state = Session::unauthenticated();
        tracing::info!("Logged out");
        Ok(())
    }

    /// Clears credentials after the server rejected them (401 on any
    /// authenticated call). Callers must treat this as "session ended".
    pub async fn invalidate(&self, reason: &str) {
        tracing::warn!("Invalidating session: {}", reason);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.token_store.clear() {
            tracing::error!("Failed to clear persisted token: {}", e);
        }
        let mut state = self.state.write().await;
        *state = Session::unauthenticated();
    }
}
