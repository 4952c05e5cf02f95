use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub token_path: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            base_url: std::env::var("LISTINGWATCH_BASE_URL")
                .map_err(|_| {
                    anyhow::anyhow!("LISTINGWATCH_BASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("LISTINGWATCH_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("LISTINGWATCH_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            token_path: std::env::var("LISTINGWATCH_TOKEN_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| ".listingwatch-token".to_string()),
            request_timeout_secs: std::env::var("LISTINGWATCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    anyhow::anyhow!("LISTINGWATCH_TIMEOUT_SECS must be a positive number")
                })?,
        };

        // Log successful configuration load (token path is local, nothing sensitive here)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Service base URL: {}", config.base_url);
        tracing::debug!("Token path: {}", config.token_path);
        tracing::debug!("Request timeout: {}s", config.request_timeout_secs);

        Ok(config)
    }
}
