use crate::utils::error::{EvidenceError, Result};
use reqwest::Client;
use std::time::Duration;

pub fn build_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("evidence-etl/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Fetches `url` into memory. Non-2xx responses become `DownloadError`.
pub async fn download(client: &Client, url: &str) -> Result<Vec<u8>> {
    tracing::debug!("Downloading {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(EvidenceError::DownloadError {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    tracing::debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_download_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/files/hotspots_v2.xls");
            then.status(200).body("workbook-bytes");
        });

        let client = build_client(5).unwrap();
        let bytes = download(&client, &server.url("/files/hotspots_v2.xls"))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(bytes, b"workbook-bytes");
    }

    #[tokio::test]
    async fn test_download_reports_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.tar.gz");
            then.status(404);
        });

        let client = build_client(5).unwrap();
        let err = download(&client, &server.url("/missing.tar.gz"))
            .await
            .unwrap_err();

        match err {
            EvidenceError::DownloadError { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other}"),
        }
    }
}
