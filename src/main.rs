//! Command-line driver for the ListingWatch client.
//!
//! Stands in for a UI layer: each invocation restores the persisted session,
//! runs one operation, and prints the outcome.

use listingwatch::api_client::FraudServiceClient;
use listingwatch::config::Config;
use listingwatch::ingest::{IngestState, IngestionPipeline};
use listingwatch::models::{ListingUpdate, SessionStatus};
use listingwatch::session::{FileTokenStore, SessionStore};
use listingwatch::verification::{
    select_high_confidence_pending, ReportFilter, VerificationCoordinator,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: listingwatch <command> [args]

Commands:
  signup <agency> <username> <password>
  login <username> <password>
  logout
  whoami
  upload <file.csv>
  listings
  update-listing <id> <field> <value>
  delete-listing <id>
  import
  scan
  reports [min-confidence]
  verify-pending <threshold>
  jobs
  upload-reference <year> <file.csv>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = Config::from_env()?;
    let session = Arc::new(SessionStore::new(FileTokenStore::new(&config.token_path)));
    let client = FraudServiceClient::new(&config, Arc::clone(&session))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    match command.as_str() {
        "signup" => {
            let [agency, username, password] = require_args(&args[1..])?;
            client
                .signup(agency, username, password)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Agency {} registered; you can now log in.", agency);
        }
        "login" => {
            let [username, password] = require_args(&args[1..])?;
            let session = client
                .login(username, password)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!(
                "Logged in as {} for {} (token expires {})",
                session.subject_id, session.agency_name, session.expires_at
            );
        }
        "logout" => {
            session
                .logout(&client)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Logged out.");
        }
        "whoami" => {
            let snapshot = session.restore(&client).await.map_err(|e| anyhow::anyhow!("{}", e))?;
            match snapshot.status {
                SessionStatus::Authenticated => println!(
                    "{} ({})",
                    snapshot.subject_id,
                    if snapshot.agency_name.is_empty() {
                        "unknown agency"
                    } else {
                        &snapshot.agency_name
                    }
                ),
                _ => println!("Not logged in."),
            }
        }
        "upload" => {
            let [path] = require_args(&args[1..])?;
            ensure_session(&session, &client).await?;

            let bytes = tokio::fs::read(path).await?;
            let filename = std::path::Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("listings.csv");

            let mut pipeline = IngestionPipeline::new();
            pipeline
                .accept_file(filename, bytes)
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            if let IngestState::Mapping { headers, mapping, .. } = pipeline.state() {
                println!("Columns found: {}", headers.join(", "));
                println!(
                    "Proposed mapping: {}",
                    serde_json::to_string_pretty(mapping)?
                );
            }

            let stats = pipeline
                .submit(&client)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!(
                "Uploaded: {} records processed, {} skipped.",
                stats.records_processed, stats.records_skipped
            );
        }
        "listings" => {
            ensure_session(&session, &client).await?;
            let listings = client
                .list_listings()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            for listing in &listings {
                println!(
                    "#{} {} {} / {} [{}]{}",
                    listing.id,
                    listing.address,
                    listing.postcode,
                    listing.client_name,
                    listing.status,
                    listing
                        .withdrawn_date
                        .map(|d| format!(" withdrawn {}", d))
                        .unwrap_or_default()
                );
            }
            println!("{} listings.", listings.len());
        }
        "update-listing" => {
            let [id, field, value] = require_args(&args[1..])?;
            let id: i64 = id.parse()?;
            ensure_session(&session, &client).await?;

            let mut update = ListingUpdate::default();
            match field.as_str() {
                "address" => update.address = Some(value.clone()),
                "postcode" => update.postcode = Some(value.clone()),
                "client-name" => update.client_name = Some(value.clone()),
                "status" => update.status = Some(value.clone()),
                "withdrawn-date" => update.withdrawn_date = Some(value.parse()?),
                other => anyhow::bail!(
                    "Unknown field {}; expected address, postcode, client-name, status, or withdrawn-date",
                    other
                ),
            }
            let record = client
                .update_listing(id, &update)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!(
                "Updated #{}: {} {} / {} [{}]",
                record.id, record.address, record.postcode, record.client_name, record.status
            );
        }
        "delete-listing" => {
            let [id] = require_args(&args[1..])?;
            let id: i64 = id.parse()?;
            ensure_session(&session, &client).await?;
            client
                .delete_listing(id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Deleted listing {}.", id);
        }
        "import" => {
            ensure_session(&session, &client).await?;
            let outcome = client
                .import_from_property_hub()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Imported {} listings from PropertyHub.", outcome.imported);
            for error in &outcome.errors {
                println!("  skipped: {}", error);
            }
        }
        "scan" => {
            ensure_session(&session, &client).await?;
            client
                .trigger_scan()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Fraud scan triggered.");
        }
        "reports" => {
            ensure_session(&session, &client).await?;
            let filter = ReportFilter {
                min_confidence: args.get(1).map(|v| v.parse()).transpose()?,
                ..ReportFilter::default()
            };
            let reports = client
                .list_fraud_reports(&filter)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            for report in &reports {
                println!(
                    "#{} {:.0}% {:?} {} / {}",
                    report.id,
                    report.confidence_score * 100.0,
                    report.verification_status,
                    report.property_address,
                    report.client_name
                );
            }
            println!("{} reports.", reports.len());
        }
        "verify-pending" => {
            let [threshold] = require_args(&args[1..])?;
            let threshold: f64 = threshold.parse()?;
            ensure_session(&session, &client).await?;

            let reports = client
                .list_fraud_reports(&ReportFilter::default())
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let selected = select_high_confidence_pending(&reports, threshold);
            let ids: Vec<i64> = selected.iter().map(|r| r.id).collect();
            if ids.is_empty() {
                println!("Nothing to verify at threshold {}.", threshold);
                return Ok(());
            }

            let coordinator = VerificationCoordinator::new();
            match coordinator
                .verify(&client, &ids)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?
            {
                Some(summary) => println!(
                    "Verified {} matches: {} confirmed fraud, {} cleared, {} errors. Re-fetch reports for per-item status.",
                    ids.len(), summary.confirmed_fraud, summary.not_fraud, summary.errors
                ),
                None => println!("A verification batch is already running."),
            }
        }
        "jobs" => {
            ensure_session(&session, &client).await?;
            let jobs = client
                .list_reference_jobs()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            for job in &jobs {
                println!(
                    "{} {} ({}) {:?}: {} processed, {} skipped",
                    job.id,
                    job.filename,
                    job.source_year,
                    job.status,
                    job.records_processed,
                    job.records_skipped
                );
            }
            println!("{} jobs.", jobs.len());
        }
        "upload-reference" => {
            let [year, path] = require_args(&args[1..])?;
            let year: u16 = year.parse()?;
            ensure_session(&session, &client).await?;

            let bytes = tokio::fs::read(path).await?;
            let filename = std::path::Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("reference.csv");
            let job = client
                .upload_reference_dataset(year, filename, bytes)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Accepted as job {} ({:?}).", job.id, job.status);
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Restores the persisted session and fails if it did not come back
/// authenticated.
async fn ensure_session(
    session: &Arc<SessionStore>,
    client: &FraudServiceClient,
) -> anyhow::Result<()> {
    let snapshot = session
        .restore(client)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    if snapshot.status != SessionStatus::Authenticated {
        anyhow::bail!("Not logged in; run `listingwatch login <username> <password>` first");
    }
    Ok(())
}

/// Fixed-arity positional argument extraction.
fn require_args<const N: usize>(args: &[String]) -> anyhow::Result<[&String; N]> {
    if args.len() < N {
        anyhow::bail!("Expected {} argument(s)\n\n{}", N, USAGE);
    }
    let mut out: Vec<&String> = Vec::with_capacity(N);
    for arg in &args[..N] {
        out.push(arg);
    }
    out.try_into()
        .map_err(|_| anyhow::anyhow!("argument extraction failed"))
}
