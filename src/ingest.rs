//! Listings ingestion pipeline.
//!
//! A strict forward state machine:
//!
//! ```text
//! Idle -> HasFile -> Mapping -> Submitting -> Succeeded
//!                       ^            |
//!                       +------------+   (only backward edge: failed submit)
//! ```
//!
//! A failed submission returns to `Mapping` with file and mapping intact so
//! no work is lost. `reset` is valid from any state. The stateless
//! third-party import path and the scan trigger live directly on
//! `FraudServiceClient`; they carry no pipeline state.

use crate::api_client::FraudServiceClient;
use crate::errors::ClientError;
use crate::models::{CanonicalField, ColumnMapping, UploadStats};
use crate::tabular;

/// Pipeline state. Each variant owns exactly the data valid in that state.
#[derive(Debug, Clone)]
pub enum IngestState {
    /// No file selected.
    Idle,
    /// A file has been accepted; headers not yet extracted.
    HasFile { filename: String, bytes: Vec<u8> },
    /// Headers extracted; the mapping is being edited.
    Mapping {
        filename: String,
        bytes: Vec<u8>,
        headers: Vec<String>,
        mapping: ColumnMapping,
    },
    /// One submission is in flight. Structurally prevents a second submit.
    Submitting {
        filename: String,
        bytes: Vec<u8>,
        headers: Vec<String>,
        mapping: ColumnMapping,
    },
    /// Submission accepted; carries the returned ingestion statistics.
    Succeeded { stats: UploadStats },
}

impl IngestState {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            IngestState::Idle => "Idle",
            IngestState::HasFile { .. } => "HasFile",
            IngestState::Mapping { .. } => "Mapping",
            IngestState::Submitting { .. } => "Submitting",
            IngestState::Succeeded { .. } => "Succeeded",
        }
    }
}

/// Proposes a column mapping for a header list.
///
/// For each canonical field, the first header whose lowercase form equals the
/// field key wins; failing that, the first header related to the key as a
/// substring (either direction, so "Client" maps to `client_name`). First
/// match in header order wins; unmatched fields stay unset. Run once per
/// file, never re-run on edits.
pub fn auto_map(headers: &[String]) -> ColumnMapping {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let mut mapping = ColumnMapping::default();

    for field in CanonicalField::ALL {
        let key = field.key();
        let exact = lowered.iter().position(|h| h == key);
        let chosen = exact.or_else(|| {
            lowered
                .iter()
                .position(|h| !h.is_empty() && (h.contains(key) || key.contains(h.as_str())))
        });
        if let Some(index) = chosen {
            mapping.set(field, Some(headers[index].clone()));
        }
    }
    mapping
}

/// Drives one file from selection to submission. Single-writer: only this
/// pipeline mutates its state; callers observe it via `state()`.
#[derive(Debug, Default)]
pub struct IngestionPipeline {
    state: IngestState,
}

impl Default for IngestState {
    fn default() -> Self {
        IngestState::Idle
    }
}

impl IngestionPipeline {
    pub fn new() -> Self {
        Self {
            state: IngestState::Idle,
        }
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    /// Accepts a listings file. Valid only in `Idle` or `HasFile`; parsing
    /// failures leave the state untouched. On success the pipeline moves
    /// through `HasFile` to `Mapping` with an auto-proposed mapping.
    pub fn accept_file(&mut self, filename: &str, bytes: Vec<u8>) -> Result<(), ClientError> {
        match self.state {
            IngestState::Idle | IngestState::HasFile { .. } => {}
            _ => {
                return Err(ClientError::State(format!(
                    "cannot accept a file in state {}",
                    self.state.name()
                )))
            }
        }

        let headers = tabular::parse_headers(&bytes)?;
        self.state = IngestState::HasFile {
            filename: filename.to_string(),
            bytes,
        };

        // Header extraction is synchronous, so HasFile and Mapping happen in
        // the same tick.
        let IngestState::HasFile { filename, bytes } = std::mem::take(&mut self.state) else {
            unreachable!("state set to HasFile above");
        };
        let mapping = auto_map(&headers);
        tracing::info!(
            "Accepted file {} with {} columns, auto-mapped {} of {} fields",
            filename,
            headers.len(),
            CanonicalField::ALL.len() - mapping.missing_labels().len(),
            CanonicalField::ALL.len()
        );
        self.state = IngestState::Mapping {
            filename,
            bytes,
            headers,
            mapping,
        };
        Ok(())
    }

    /// Overwrites a single field mapping. Valid only while mapping.
    pub fn set_mapping(
        &mut self,
        field: CanonicalField,
        column: Option<String>,
    ) -> Result<(), ClientError> {
        match &mut self.state {
            IngestState::Mapping { mapping, .. } => {
                mapping.set(field, column);
                Ok(())
            }
            other => Err(ClientError::State(format!(
                "cannot edit the mapping in state {}",
                other.name()
            ))),
        }
    }

    /// The current mapping, when one is being edited or submitted.
    pub fn mapping(&self) -> Option<&ColumnMapping> {
        match &self.state {
            IngestState::Mapping { mapping, .. } | IngestState::Submitting { mapping, .. } => {
                Some(mapping)
            }
            _ => None,
        }
    }

    /// Submits the file and mapping.
    ///
    /// Fails with `Validation` (listing the missing field labels) before any
    /// network call if the mapping is incomplete; the state does not change.
    /// A remote or network failure returns the pipeline to `Mapping` with
    /// file and mapping intact and surfaces the server detail when present.
    pub async fn submit(
        &mut self,
        client: &FraudServiceClient,
    ) -> Result<UploadStats, ClientError> {
        if !matches!(self.state, IngestState::Mapping { .. }) {
            return Err(ClientError::State(format!(
                "cannot submit in state {}",
                self.state.name()
            )));
        }

        {
            let IngestState::Mapping { mapping, .. } = &self.state else {
                unreachable!("checked above");
            };
            let missing = mapping.missing_labels();
            if !missing.is_empty() {
                tracing::warn!("Submit blocked, unmapped fields: {}", missing.join(", "));
                return Err(ClientError::Validation(missing));
            }
        }

        let IngestState::Mapping {
            filename,
            bytes,
            headers,
            mapping,
        } = std::mem::take(&mut self.state)
        else {
            unreachable!("checked above");
        };

        self.state = IngestState::Submitting {
            filename: filename.clone(),
            bytes: bytes.clone(),
            headers,
            mapping: mapping.clone(),
        };

        match client.upload_listings(&filename, bytes, &mapping).await {
            Ok(stats) => {
                tracing::info!(
                    "Upload succeeded: {} processed, {} skipped",
                    stats.records_processed,
                    stats.records_skipped
                );
                self.state = IngestState::Succeeded { stats };
                Ok(stats)
            }
            Err(e) => {
                tracing::warn!("Upload failed, returning to mapping: {}", e);
                let IngestState::Submitting {
                    filename,
                    bytes,
                    headers,
                    mapping,
                } = std::mem::take(&mut self.state)
                else {
                    unreachable!("set to Submitting above");
                };
                self.state = IngestState::Mapping {
                    filename,
                    bytes,
                    headers,
                    mapping,
                };
                Err(e)
            }
        }
    }

    /// Returns to `Idle`, discarding file, headers, mapping, and statistics.
    /// Valid from any state.
    pub fn reset(&mut self) {
        self.state = IngestState::Idle;
    }
}
