//! Batch verification over fraud-report matches.
//!
//! The coordinator turns a set of selected match ids into one batched remote
//! call and reports the aggregate outcome. It never patches per-item status:
//! the response is aggregate-only, so the report list is treated as a cache
//! the caller re-fetches after a successful verify.

use crate::api_client::FraudServiceClient;
use crate::errors::ClientError;
use crate::models::{FraudReportMatch, VerificationStatus, VerificationSummary};
use std::sync::atomic::{AtomicBool, Ordering};

/// Display/query filter over the report list. Translates to query parameters
/// on the list endpoint; changing either filter means a fresh fetch.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<VerificationStatus>,
    pub min_confidence: Option<f64>,
    /// Result cap requested from the server.
    pub limit: Option<u32>,
}

impl ReportFilter {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(min_confidence) = self.min_confidence {
            params.push(("min_confidence", min_confidence.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Pure filter building a one-click bulk-verify set: every report still
/// awaiting verification whose confidence meets the threshold. Never mutates
/// the input; returns cloned snapshots.
pub fn select_high_confidence_pending(
    reports: &[FraudReportMatch],
    threshold: f64,
) -> Vec<FraudReportMatch> {
    reports
        .iter()
        .filter(|r| {
            r.verification_status == VerificationStatus::Suspicious
                && r.confidence_score >= threshold
        })
        .cloned()
        .collect()
}

/// Coordinates batch verification calls. At most one batch is outstanding at
/// a time; further calls while one is pending are ignored, not queued.
#[derive(Debug, Default)]
pub struct VerificationCoordinator {
    in_flight: AtomicBool,
}

impl VerificationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a batch verify is outstanding; lets callers disable the
    /// trigger instead of racing it.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Verifies a batch of match ids.
    ///
    /// Fails fast with `Validation` (no network call) when `ids` is empty.
    /// Returns `Ok(None)` when a batch is already in flight (the call is
    /// ignored). On success only the aggregate summary is returned; the
    /// caller must re-fetch the report list for authoritative per-item
    /// status. On failure the report list is untouched: the response is
    /// atomic, so no partial application of counts is valid.
    pub async fn verify(
        &self,
        client: &FraudServiceClient,
        ids: &[i64],
    ) -> Result<Option<VerificationSummary>, ClientError> {
        if ids.is_empty() {
            return Err(ClientError::Validation(vec![
                "no matches selected for verification".to_string(),
            ]));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Ignoring verify request, a batch is already in flight");
            return Ok(None);
        }

        let result = client.verify_matches(ids).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(summary) => {
                tracing::info!(
                    "Verification batch of {} done: {} confirmed, {} cleared, {} errors",
                    ids.len(),
                    summary.confirmed_fraud,
                    summary.not_fraud,
                    summary.errors
                );
                Ok(Some(summary))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: i64, status: VerificationStatus, confidence: f64) -> FraudReportMatch {
        FraudReportMatch {
            id,
            property_address: format!("{} Test Street", id),
            client_name: "Client".to_string(),
            confidence_score: confidence,
            risk_level: None,
            verification_status: status,
            official_record_price: None,
        }
    }

    #[test]
    fn selects_only_suspicious_at_or_above_threshold() {
        let reports = vec![
            report(1, VerificationStatus::Suspicious, 0.95),
            report(2, VerificationStatus::Suspicious, 0.80),
            report(3, VerificationStatus::ConfirmedFraud, 0.99),
            report(4, VerificationStatus::NotFraud, 0.97),
            report(5, VerificationStatus::Suspicious, 0.90),
        ];
        let selected = select_high_confidence_pending(&reports, 0.9);
        let ids: Vec<i64> = selected.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn selection_is_pure() {
        let reports = vec![
            report(1, VerificationStatus::Suspicious, 0.95),
            report(2, VerificationStatus::Error, 0.95),
        ];
        let before = serde_json::to_string(&reports).unwrap();
        let first = select_high_confidence_pending(&reports, 0.5);
        let second = select_high_confidence_pending(&reports, 0.5);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(serde_json::to_string(&reports).unwrap(), before);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let reports = vec![report(1, VerificationStatus::Suspicious, 0.9)];
        assert_eq!(select_high_confidence_pending(&reports, 0.9).len(), 1);
        assert_eq!(select_high_confidence_pending(&reports, 0.9001).len(), 0);
    }

    #[test]
    fn filter_query_params_cover_set_fields_only() {
        let filter = ReportFilter {
            status: Some(VerificationStatus::Suspicious),
            min_confidence: Some(0.75),
            limit: None,
        };
        assert_eq!(
            filter.query_params(),
            vec![
                ("status", "suspicious".to_string()),
                ("min_confidence", "0.75".to_string()),
            ]
        );
        assert!(ReportFilter::default().query_params().is_empty());
    }
}
