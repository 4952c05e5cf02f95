use crate::config::Config;
use crate::errors::ClientError;
use crate::models::*;
use crate::session::SessionStore;
use crate::verification::ReportFilter;
use reqwest::multipart;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client for the fraud-detection service.
///
/// A thin request executor: attaches the current bearer token from the
/// `SessionStore`, maps non-2xx responses into the error taxonomy, and
/// invalidates the session on a 401 from any authenticated call.
#[derive(Clone)]
pub struct FraudServiceClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl FraudServiceClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer token for authenticated calls. Failing here means there is no
    /// session; no request is issued.
    async fn bearer(&self) -> Result<String, ClientError> {
        self.session
            .current_token()
            .await
            .ok_or_else(|| ClientError::Auth("no active session".to_string()))
    }

    /// Maps a response into the taxonomy. `authenticated` selects whether a
    /// 401 tears down the session (it never does for login/signup, where a
    /// 401 just means bad credentials).
    async fn check(
        &self,
        response: reqwest::Response,
        authenticated: bool,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .text()
            .await
            .ok()
            .and_then(|body| extract_error_detail(&body));

        if status == reqwest::StatusCode::UNAUTHORIZED {
            let msg = detail.unwrap_or_else(|| "credentials rejected by server".to_string());
            if authenticated {
                self.session.invalidate(&msg).await;
            }
            return Err(ClientError::Auth(msg));
        }

        tracing::error!("Service returned {}: {:?}", status, detail);
        Err(ClientError::Remote {
            status: status.as_u16(),
            detail,
        })
    }

    // ============ Auth ============

    /// Logs in and establishes the session from the response, which already
    /// carries the agency identity.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ClientError> {
        tracing::info!("Logging in as {}", username);
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Login request failed: {}", e)))?;

        let response = self.check(response, false).await?;
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse login response: {}", e)))?;

        self.session
            .login(&body.token, &body.agency_id, &body.agency_name)
            .await
    }

    /// Registers a new agency account. Does not log in.
    pub async fn signup(
        &self,
        agency_name: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        tracing::info!("Signing up agency {}", agency_name);
        let response = self
            .client
            .post(self.url("/auth/signup"))
            .json(&SignupRequest {
                agency_name: agency_name.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Signup request failed: {}", e)))?;

        self.check(response, false).await?;
        Ok(())
    }

    /// Best-effort server-side logout. Callers decide whether a failure
    /// matters; `SessionStore::logout` ignores it.
    pub async fn notify_logout(&self) -> Result<(), ClientError> {
        let Some(token) = self.session.current_token().await else {
            return Ok(());
        };
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Logout request failed: {}", e)))?;

        // A 401 here means the token is already dead server-side, which is
        // exactly the state logout wants; don't invalidate twice.
        if response.status().is_success() || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Ok(());
        }
        self.check(response, false).await?;
        Ok(())
    }

    /// Fetches the server-confirmed identity for the current token.
    pub async fn fetch_profile(&self) -> Result<Profile, ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Refreshing profile");
        let response = self
            .client
            .get(self.url("/auth/profile"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Profile request failed: {}", e)))?;

        let response = self.check(response, true).await?;
        response.json().await.map_err(|e| {
            ClientError::Network(format!("Failed to parse profile response: {}", e))
        })
    }

    // ============ Listings ============

    /// Uploads a listings file with its serialized column mapping.
    pub async fn upload_listings(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mapping: &ColumnMapping,
    ) -> Result<UploadStats, ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Uploading listings file {}", filename);

        let mapping_json = serde_json::to_string(mapping)
            .map_err(|e| ClientError::Parse(format!("Failed to serialize mapping: {}", e)))?;
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(filename.to_string()),
            )
            .text("mapping", mapping_json);

        let response = self
            .client
            .post(self.url("/listings/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Upload request failed: {}", e)))?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse upload response: {}", e)))
    }

    pub async fn list_listings(&self) -> Result<Vec<ListingRecord>, ClientError> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(self.url("/listings"))
            .bearer_auth(token)
            .send()
            .await?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse listings: {}", e)))
    }

    pub async fn update_listing(
        &self,
        id: i64,
        update: &ListingUpdate,
    ) -> Result<ListingRecord, ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Updating listing {}", id);
        let response = self
            .client
            .patch(self.url(&format!("/listings/{}", id)))
            .bearer_auth(token)
            .json(update)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Update request failed: {}", e)))?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse updated listing: {}", e)))
    }

    pub async fn delete_listing(&self, id: i64) -> Result<(), ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Deleting listing {}", id);
        let response = self
            .client
            .delete(self.url(&format!("/listings/{}", id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Delete request failed: {}", e)))?;

        self.check(response, true).await?;
        Ok(())
    }

    // ============ Scanning & reports ============

    /// Triggers a server-side fraud scan. Success carries no payload.
    pub async fn trigger_scan(&self) -> Result<(), ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Triggering fraud scan");
        let response = self
            .client
            .post(self.url("/scan"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Scan request failed: {}", e)))?;

        self.check(response, true).await?;
        Ok(())
    }

    /// Lists fraud reports with the filter translated into query parameters.
    pub async fn list_fraud_reports(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<FraudReportMatch>, ClientError> {
        let token = self.bearer().await?;
        let url = reqwest::Url::parse_with_params(
            &self.url("/fraud-reports"),
            filter.query_params(),
        )
        .map_err(|e| ClientError::Network(format!("Failed to build URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Reports request failed: {}", e)))?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse fraud reports: {}", e)))
    }

    /// Submits one batch of match ids for verification. The response is the
    /// aggregate summary only; per-item status comes from a later re-fetch.
    pub async fn verify_matches(&self, ids: &[i64]) -> Result<VerificationSummary, ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Verifying {} matches", ids.len());
        let response = self
            .client
            .post(self.url("/fraud-reports/verify"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Verify request failed: {}", e)))?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse verify response: {}", e)))
    }

    // ============ Integrations & reference data ============

    /// Idempotent import from the third-party property-management system.
    pub async fn import_from_property_hub(&self) -> Result<ImportOutcome, ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Importing listings from PropertyHub");
        let response = self
            .client
            .post(self.url("/integrations/propertyhub/import"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Import request failed: {}", e)))?;

        let response = self.check(response, true).await?;
        let outcome: ImportOutcome = response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse import outcome: {}", e)))?;

        for error in &outcome.errors {
            tracing::warn!("PropertyHub record skipped: {}", error);
        }
        tracing::info!("Imported {} listings from PropertyHub", outcome.imported);
        Ok(outcome)
    }

    /// Uploads an official reference dataset for the given year; the server
    /// answers with an accepted processing job.
    pub async fn upload_reference_dataset(
        &self,
        year: u16,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadJob, ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Uploading reference dataset {} for {}", filename, year);

        let form = multipart::Form::new()
            .text("year", year.to_string())
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(filename.to_string()),
            );

        let response = self
            .client
            .post(self.url("/reference-data/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Dataset upload failed: {}", e)))?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse upload job: {}", e)))
    }

    pub async fn list_reference_jobs(&self) -> Result<Vec<UploadJob>, ClientError> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(self.url("/reference-data/jobs"))
            .bearer_auth(token)
            .send()
            .await?;

        let response = self.check(response, true).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to parse job list: {}", e)))
    }

    pub async fn delete_reference_job(&self, id: Uuid) -> Result<(), ClientError> {
        let token = self.bearer().await?;
        tracing::info!("Deleting reference job {}", id);
        let response = self
            .client
            .delete(self.url(&format!("/reference-data/jobs/{}", id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Job delete failed: {}", e)))?;

        self.check(response, true).await?;
        Ok(())
    }
}

/// Pulls the human-readable detail out of a `{"error": "..."}` body; any
/// other body shape yields no detail.
fn extract_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.as_str())
        .map(|s| s.to_string())
}
