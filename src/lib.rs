//! ListingWatch client library.
//!
//! A client for the ListingWatch property-listing fraud-detection service:
//! agency authentication with a persisted-token session lifecycle, listings
//! ingestion (CSV upload with heuristic column mapping, or a third-party
//! property-management import), and a human-in-the-loop verification workflow
//! over server-produced fraud matches. Fraud matching itself runs on the
//! remote service; this crate only displays scores and triggers verification.
//!
//! # Modules
//!
//! - `api_client`: HTTP client for the fraud-detection service.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `ingest`: Listings ingestion state machine and auto-mapping heuristic.
//! - `models`: Core data models.
//! - `session`: Credential and identity lifecycle.
//! - `tabular`: Header extraction for delimited files.
//! - `verification`: Batch verification coordination.

pub mod api_client;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod session;
pub mod tabular;
pub mod verification;
