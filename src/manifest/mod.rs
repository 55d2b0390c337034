use log::info;
use serde::{Deserialize, Serialize};

use crate::catalog::{ResourceCatalog, ResourceEntry};
use crate::error::Error;
use crate::networking::NetworkClient;

/// Production version-check endpoint.
pub const VERSION_CHECK_ENDPOINT: &str = "https://api-pub.nexon.com/patch/v1.1/version-check";

const MANIFEST_FILENAME: &str = "resource-data.json";

/// Handshake fields the version check expects. `Default` carries the
/// known-good production values; the CLI overrides the locale/market ones.
#[derive(Debug, Clone, Serialize)]
pub struct VersionCheckRequest {
    pub market_game_id: String,
    pub language: String,
    pub market_code: String,
    pub country: String,
    pub sdk_version: String,
    pub curr_build_version: String,
    pub curr_build_number: String,
    pub curr_patch_version: String,
}

impl Default for VersionCheckRequest {
    fn default() -> Self {
        Self {
            market_game_id: "com.nexon.bluearchive".into(),
            language: "ko-KR".into(),
            market_code: "playstore".into(),
            country: "KR".into(),
            sdk_version: "239".into(),
            curr_build_version: "1.69.303739".into(),
            curr_build_number: "303739".into(),
            curr_patch_version: "1207".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionCheckResponse {
    patch: PatchInfo,
}

#[derive(Debug, Deserialize)]
struct PatchInfo {
    resource_path: String,
}

#[derive(Debug, Deserialize)]
struct ResourceManifest {
    resources: Vec<ResourceEntry>,
}

/// Resolve the two-stage manifest chain: the version check yields a pointer
/// to the full resource manifest, which is then fetched and filtered into
/// the bundle catalog.
///
/// Returns the CDN base path (the pointer's URL path minus the manifest
/// filename) alongside the catalog. Any network or shape failure aborts the
/// resolution; nothing can be downloaded without a manifest.
pub async fn resolve(
    client: &NetworkClient,
    endpoint: &str,
    request: &VersionCheckRequest,
) -> Result<(String, ResourceCatalog), Error> {
    let response: VersionCheckResponse = client.post_json(endpoint, request).await?;
    let pointer = response.patch.resource_path;
    if pointer.is_empty() {
        return Err(Error::Protocol(
            "version check returned an empty resource_path".into(),
        ));
    }

    let base_path = base_path_of(&pointer)?;
    info!("resource manifest at {pointer}");

    let manifest: ResourceManifest = client.get_json(&pointer).await?;
    let catalog = ResourceCatalog::from_entries(manifest.resources);
    info!("catalog holds {} bundles", catalog.len());

    Ok((base_path, catalog))
}

/// URL path of the manifest pointer with the trailing manifest filename
/// stripped. Individual bundles hang off this directory.
fn base_path_of(pointer: &str) -> Result<String, Error> {
    let url = reqwest::Url::parse(pointer).map_err(|err| {
        Error::Protocol(format!("manifest pointer {pointer:?} is not a URL: {err}"))
    })?;
    let path = url.path();
    let base = path
        .strip_suffix(&format!("/{MANIFEST_FILENAME}"))
        .unwrap_or(path);
    Ok(base.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check_endpoint(server: &mockito::Server) -> String {
        format!("{}/patch/v1.1/version-check", server.url())
    }

    #[tokio::test]
    async fn resolves_pointer_then_fetches_and_filters_the_manifest() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let pointer = format!("{}/kr/123/resource-data.json", server.url());

        let _check = server
            .mock("POST", "/patch/v1.1/version-check")
            .match_body(mockito::Matcher::PartialJson(json!({
                "market_game_id": "com.nexon.bluearchive",
            })))
            .with_body(json!({"patch": {"resource_path": pointer}}).to_string())
            .create_async()
            .await;
        // The CDN serves the manifest without a JSON content-type.
        let _manifest = server
            .mock("GET", "/kr/123/resource-data.json")
            .with_header("content-type", "text/plain")
            .with_body(
                json!({"resources": [
                    {"group": "GameData", "resource_path": "GameData/iOS/a.bundle"},
                    {"group": "GameData", "resource_path": "GameData/iOS/b.bundle"},
                    {"group": "Other", "resource_path": "Other/c.bundle"},
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = NetworkClient::new();
        let (base_path, catalog) = resolve(
            &client,
            &check_endpoint(&server),
            &VersionCheckRequest::default(),
        )
        .await?;

        assert_eq!(base_path, "/kr/123");
        let paths: Vec<&str> = catalog
            .entries()
            .iter()
            .map(|e| e.resource_path.as_str())
            .collect();
        assert_eq!(paths, ["GameData/iOS/a.bundle", "GameData/iOS/b.bundle"]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_pointer_field_is_a_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let _check = server
            .mock("POST", "/patch/v1.1/version-check")
            .with_body(json!({"patch": {}}).to_string())
            .create_async()
            .await;

        let client = NetworkClient::new();
        let err = resolve(
            &client,
            &check_endpoint(&server),
            &VersionCheckRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn empty_pointer_is_a_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let _check = server
            .mock("POST", "/patch/v1.1/version-check")
            .with_body(json!({"patch": {"resource_path": ""}}).to_string())
            .create_async()
            .await;

        let client = NetworkClient::new();
        let err = resolve(
            &client,
            &check_endpoint(&server),
            &VersionCheckRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn version_check_http_failure_aborts_resolution() {
        let mut server = mockito::Server::new_async().await;
        let _check = server
            .mock("POST", "/patch/v1.1/version-check")
            .with_status(503)
            .create_async()
            .await;

        let client = NetworkClient::new();
        let err = resolve(
            &client,
            &check_endpoint(&server),
            &VersionCheckRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    }

    #[test]
    fn base_path_strips_the_manifest_filename() {
        let base = base_path_of("https://cdn.example.com/kr/5/resource-data.json").unwrap();
        assert_eq!(base, "/kr/5");
    }

    #[test]
    fn base_path_of_a_bare_directory_pointer_is_unchanged() {
        let base = base_path_of("https://cdn.example.com/kr/5/other.json").unwrap();
        assert_eq!(base, "/kr/5/other.json");
    }

    #[test]
    fn non_url_pointer_is_a_protocol_error() {
        let err = base_path_of("not a url").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
