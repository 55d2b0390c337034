use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const JSON_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for the whole run.
///
/// Connection pooling lives inside `reqwest::Client`, so one instance serves
/// the manifest handshake and every concurrent bundle transfer. Opening a
/// fresh client per request would defeat both the pool and the concurrency
/// cap.
#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    /// POST `body` as JSON and decode the JSON response into `T`.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.request_json(self.client.post(url).json(body), url)
            .await
    }

    /// GET `url` and decode the JSON response into `T`.
    pub async fn get_json<T>(&self, url: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        self.request_json(self.client.get(url), url).await
    }

    // The manifest CDN serves JSON with a missing or bogus content-type, so
    // the body is read raw and parsed as JSON no matter what the headers say.
    async fn request_json<T>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = request
            .timeout(JSON_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(Error::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(Error::Network)?;
        serde_json::from_slice(&bytes)
            .map_err(|err| Error::Protocol(format!("unexpected JSON from {url}: {err}")))
    }

    /// Download `url` to `dest`, streaming the body chunk by chunk so the
    /// full payload is never held in memory. Parent directories are created
    /// on demand. `progress` receives each chunk's byte count.
    ///
    /// Bundle transfers carry no overall timeout; large files take as long
    /// as they take, and a stalled connection still trips the connect
    /// timeout or a stream error.
    ///
    /// On failure any partially written file is left in place; the handle
    /// itself is closed by scope on every exit path.
    pub async fn download_to_path<F>(
        &self,
        url: &str,
        dest: &Path,
        mut progress: F,
    ) -> Result<u64, Error>
    where
        F: FnMut(u64),
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::Filesystem {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|source| Error::Filesystem {
                path: dest.to_path_buf(),
                source,
            })?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::Network)?;
            file.write_all(&chunk)
                .await
                .map_err(|source| Error::Filesystem {
                    path: dest.to_path_buf(),
                    source,
                })?;
            written += chunk.len() as u64;
            progress(chunk.len() as u64);
        }

        file.flush().await.map_err(|source| Error::Filesystem {
            path: dest.to_path_buf(),
            source,
        })?;

        debug!("downloaded {url} -> {} ({written} bytes)", dest.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Payload {
        value: String,
    }

    #[tokio::test]
    async fn parses_json_regardless_of_declared_content_type() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/data.json")
            .with_header("content-type", "application/octet-stream")
            .with_body(r#"{"value":"ok"}"#)
            .create_async()
            .await;

        let client = NetworkClient::new();
        let payload: Payload = client.get_json(&format!("{}/data.json", server.url())).await?;
        assert_eq!(payload.value, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn post_sends_the_json_body() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/check")
            .match_body(mockito::Matcher::Json(json!({"value": "ping"})))
            .with_body(r#"{"value":"pong"}"#)
            .create_async()
            .await;

        let client = NetworkClient::new();
        let payload: Payload = client
            .post_json(&format!("{}/check", server.url()), &json!({"value": "ping"}))
            .await?;
        assert_eq!(payload.value, "pong");
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_becomes_http_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let client = NetworkClient::new();
        let err = client
            .get_json::<Payload>(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn undecodable_body_becomes_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/garbage")
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = NetworkClient::new();
        let err = client
            .get_json::<Payload>(&format!("{}/garbage", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn unreachable_host_becomes_network_error() {
        let client = NetworkClient::new();
        let err = client
            .get_json::<Payload>("http://127.0.0.1:1/nope")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn download_streams_body_to_disk_and_creates_parents() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0xAAu8; 64 * 1024];
        let _mock = server
            .mock("GET", "/a.bundle")
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::TempDir::new()?;
        let dest = dir.path().join("nested").join("a.bundle");

        let client = NetworkClient::new();
        let mut reported = 0u64;
        let written = client
            .download_to_path(&format!("{}/a.bundle", server.url()), &dest, |delta| {
                reported += delta;
            })
            .await?;

        assert_eq!(written, body.len() as u64);
        assert_eq!(reported, written);
        assert_eq!(std::fs::read(&dest)?, body);
        Ok(())
    }

    #[tokio::test]
    async fn download_of_missing_asset_fails_without_creating_a_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.bundle")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("gone.bundle");

        let client = NetworkClient::new();
        let err = client
            .download_to_path(&format!("{}/gone.bundle", server.url()), &dest, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
        assert!(!dest.exists());
    }
}
