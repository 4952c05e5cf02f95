use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Session ============

/// Authentication state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credentials held.
    Unauthenticated,
    /// A locally decoded token is held but not yet confirmed by the server.
    Pending,
    /// Server-confirmed identity.
    Authenticated,
    /// A persisted token was found but its expiry claim is in the past.
    Expired,
}

/// Snapshot of the current session. Owned by `SessionStore`; everything else
/// receives clones and never mutates one.
#[derive(Debug, Clone)]
pub struct Session {
    /// The raw bearer token as persisted.
    pub raw_token: String,
    /// Subject id from the token claims, overridden by the profile response.
    pub subject_id: String,
    /// Agency id, known after login or profile confirmation.
    pub agency_id: String,
    /// Agency display name.
    pub agency_name: String,
    /// Expiry claim embedded in the token.
    pub expires_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: SessionStatus,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self {
            raw_token: String::new(),
            subject_id: String::new(),
            agency_id: String::new(),
            agency_name: String::new(),
            expires_at: DateTime::<Utc>::MIN_UTC,
            status: SessionStatus::Unauthenticated,
        }
    }
}

// ============ Column mapping ============

/// The fixed listing attributes the service requires from every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Address,
    Postcode,
    ClientName,
    Status,
    WithdrawnDate,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        CanonicalField::Address,
        CanonicalField::Postcode,
        CanonicalField::ClientName,
        CanonicalField::Status,
        CanonicalField::WithdrawnDate,
    ];

    /// The key matched against lowercased header names.
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::Address => "address",
            CanonicalField::Postcode => "postcode",
            CanonicalField::ClientName => "client_name",
            CanonicalField::Status => "status",
            CanonicalField::WithdrawnDate => "withdrawn_date",
        }
    }

    /// Human-readable label used in validation messages.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::Address => "Address",
            CanonicalField::Postcode => "Postcode",
            CanonicalField::ClientName => "Client name",
            CanonicalField::Status => "Status",
            CanonicalField::WithdrawnDate => "Withdrawn date",
        }
    }
}

/// Mapping from canonical fields to source-file column names.
///
/// Serializes to the flat `{"address": "Addr", ...}` object the upload
/// endpoint expects; unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawn_date: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        let slot = match field {
            CanonicalField::Address => &self.address,
            CanonicalField::Postcode => &self.postcode,
            CanonicalField::ClientName => &self.client_name,
            CanonicalField::Status => &self.status,
            CanonicalField::WithdrawnDate => &self.withdrawn_date,
        };
        slot.as_deref()
    }

    /// Overwrites a single field; `None` or an empty column name unsets it.
    pub fn set(&mut self, field: CanonicalField, column: Option<String>) {
        let column = column.filter(|c| !c.trim().is_empty());
        let slot = match field {
            CanonicalField::Address => &mut self.address,
            CanonicalField::Postcode => &mut self.postcode,
            CanonicalField::ClientName => &mut self.client_name,
            CanonicalField::Status => &mut self.status,
            CanonicalField::WithdrawnDate => &mut self.withdrawn_date,
        };
        *slot = column;
    }

    /// Labels of every canonical field still lacking a source column,
    /// in declaration order.
    pub fn missing_labels(&self) -> Vec<String> {
        CanonicalField::ALL
            .iter()
            .filter(|field| self.get(**field).is_none())
            .map(|field| field.label().to_string())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_labels().is_empty()
    }
}

// ============ Listings ============

/// A listing record as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: i64,
    pub address: String,
    pub postcode: String,
    pub client_name: String,
    pub status: String,
    pub withdrawn_date: Option<NaiveDate>,
}

/// Partial update for a listing; only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawn_date: Option<NaiveDate>,
}

/// Ingestion statistics returned by a successful listings upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UploadStats {
    pub records_processed: u64,
    pub records_skipped: u64,
}

/// Outcome of the third-party property-management import.
///
/// Per-record errors are non-fatal; the import as a whole still succeeded.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportOutcome {
    pub imported: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ============ Fraud reports ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Flagged by a scan, awaiting verification.
    Suspicious,
    ConfirmedFraud,
    NotFraud,
    /// Verification could not be completed for this match.
    Error,
}

impl VerificationStatus {
    /// Wire value, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Suspicious => "suspicious",
            VerificationStatus::ConfirmedFraud => "confirmed_fraud",
            VerificationStatus::NotFraud => "not_fraud",
            VerificationStatus::Error => "error",
        }
    }
}

/// A server-computed candidate pairing a listing with an official transaction
/// record. Created by scans, transitioned by verification, never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudReportMatch {
    pub id: i64,
    pub property_address: String,
    pub client_name: String,
    /// Match confidence in [0, 1].
    pub confidence_score: f64,
    pub risk_level: Option<RiskLevel>,
    pub verification_status: VerificationStatus,
    /// Price from the official record, when the match carries one.
    pub official_record_price: Option<i64>,
}

/// Aggregate result of a batch verification. The response is atomic: either
/// all three counts apply or none do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VerificationSummary {
    pub confirmed_fraud: u64,
    pub not_fraud: u64,
    pub errors: u64,
}

// ============ Reference-dataset jobs ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

/// A server-side job processing an official reference dataset. Mutated only
/// through re-fetch of the job list, never locally.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadJob {
    pub id: Uuid,
    pub filename: String,
    pub source_year: u16,
    pub status: JobStatus,
    #[serde(default)]
    pub records_processed: u64,
    #[serde(default)]
    pub records_skipped: u64,
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// ============ Auth payloads ============

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub agency_id: String,
    pub agency_name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupRequest {
    pub agency_name: String,
    pub username: String,
    pub password: String,
}

/// Server-confirmed identity from the profile endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
}
