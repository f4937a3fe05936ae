//! Remote-file ingestion.

use std::path::Path;
use std::time::Duration;

use tokio::fs;

/// Fetch failures are retryable unless writing the destination failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed for {url}: {reason}")]
    Request { url: String, reason: String },

    #[error("Unexpected status {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Request { .. } | FetchError::Status { .. })
    }
}

/// Options for remote downloads.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Whole-request deadline.
    pub timeout: Duration,
    /// Skip TLS certificate verification. Off by default; only enable for
    /// explicitly trusted internal endpoints, since it makes the download
    /// trivially interceptable.
    pub allow_invalid_certs: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            timeout: Duration::from_secs(50),
            allow_invalid_certs: false,
        }
    }
}

/// Download `url` to a local path. Redirects are followed; any non-success
/// status is an error and partial output is removed.
pub async fn download_to(url: &str, dest: &Path, options: &FetchOptions) -> Result<(), FetchError> {
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .danger_accept_invalid_certs(options.allow_invalid_certs)
        .build()
        .map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let start = std::time::Instant::now();

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(dest).await;
            return Err(FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }
    };

    if let Err(e) = fs::write(dest, &bytes).await {
        let _ = fs::remove_file(dest).await;
        return Err(FetchError::Io(e));
    }

    tracing::info!(
        url = %url,
        size_bytes = bytes.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Remote fetch successful"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_is_on_by_default() {
        assert!(!FetchOptions::default().allow_invalid_certs);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let err = download_to(
            "http://127.0.0.1:1/never",
            &dest,
            &FetchOptions {
                timeout: Duration::from_millis(300),
                ..FetchOptions::default()
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_retryable());
        assert!(!dest.exists());
    }
}
