#![doc = "Catalog integration for the CLI: bridges the core contract to the creative platform's REST API."]
//
//! # HTTP Catalog Client
//!
//! This module wires the [`CatalogClient`] and [`ArchiveFetcher`] traits from
//! `creative-provisioner-core` to real HTTP calls made with `reqwest`.
//!
//! - Every catalog request carries the caller's API key in the `x-api-key`
//!   header; the client itself holds no credential.
//! - 401 and 403 responses become [`CatalogError::Unauthorized`].
//! - A successful response whose body carries an `errors` field becomes
//!   [`CatalogError::RemoteApplication`].
//! - One request per call. Nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use creative_provisioner_core::contract::{
    ArchiveFetcher, CatalogClient, CatalogError, CreativeBody, Credentials, FolderSet,
    NewCreative, NewFolderSet,
};

pub const DEFAULT_BASE_URL: &str = "https://api.system.netsalesmedia.pl";

const API_KEY_HEADER: &str = "x-api-key";
const LIST_SETS: &str = "creatives/creativeset/list";
const GET_SINGLE_SET: &str = "creatives/creativeset/single";
const CREATE_SET: &str = "creatives/creativeset/create";
const CREATE_LINK_CREATIVE: &str = "creatives/creative/link/create";
const CREATE_IMAGE_CREATIVE: &str = "creatives/creative/image/createHosted";
const GET_USER_INFO: &str = "access/user/get";
const ACTIVE: &str = "ACTIVE";

pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpCatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalogClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn build_client(timeout: Duration) -> Result<Client, CatalogError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CatalogError::Transport {
            status: None,
            message: format!("failed to create HTTP client: {e}"),
        })
}

impl HttpCatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let client = build_client(timeout)?;
        tracing::info!(base_url, timeout_secs = timeout.as_secs(), "Initialized HttpCatalogClient");
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        credentials: &Credentials,
    ) -> Result<Value, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(path))
            .header(API_KEY_HEADER, &credentials.api_key)
            .query(query);
        send(request, path).await
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        credentials: &Credentials,
    ) -> Result<Value, CatalogError> {
        let request = self
            .client
            .post(self.endpoint(path))
            .header(API_KEY_HEADER, &credentials.api_key)
            .json(body);
        let value = send(request, path).await?;
        if let Some(errors) = application_errors(&value) {
            tracing::error!(path, ?errors, "[CLIENT] Remote application error");
            return Err(CatalogError::RemoteApplication(errors));
        }
        Ok(value)
    }

    /// Checks that the API key is accepted by the platform.
    pub async fn verify_credentials(&self, credentials: &Credentials) -> Result<(), CatalogError> {
        tracing::info!("[CLIENT] Verifying API key");
        self.get_json(GET_USER_INFO, &[], credentials).await?;
        Ok(())
    }
}

async fn send(request: RequestBuilder, path: &str) -> Result<Value, CatalogError> {
    let response = request.send().await.map_err(|e| {
        tracing::error!(path, error = %e, "[CLIENT] HTTP request failed");
        CatalogError::Transport {
            status: None,
            message: format!("HTTP request failed: {e}"),
        }
    })?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::error!(path, status = status.as_u16(), "[CLIENT] Credential rejected");
        return Err(CatalogError::Unauthorized);
    }
    if !status.is_success() {
        let message = extract_error_message(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.clone()
            }
        });
        tracing::error!(path, status = status.as_u16(), %message, "[CLIENT] Request rejected");
        return Err(CatalogError::Transport {
            status: Some(status.as_u16()),
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| CatalogError::Malformed(format!("{path}: {e}")))
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;
    if let Some(errors) = application_errors(&parsed) {
        return Some(errors.join("; "));
    }
    parsed
        .get("message")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// Application-level errors reported inside a 2xx body, if any.
fn application_errors(body: &Value) -> Option<Vec<String>> {
    let errors = body.get("errors")?;
    match errors {
        Value::Null => None,
        Value::Array(items) if items.is_empty() => {
            Some(vec!["request rejected without details".to_string()])
        }
        Value::Array(items) => Some(items.iter().map(render_error).collect()),
        other => Some(vec![render_error(other)]),
    }
}

fn render_error(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn parse_folder_list(value: Value, path: &str) -> Result<Vec<FolderSet>, CatalogError> {
    if !value.is_array() {
        return Err(CatalogError::Malformed(format!("{path}: expected a folder list")));
    }
    serde_json::from_value(value).map_err(|e| CatalogError::Malformed(format!("{path}: {e}")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderBody<'a> {
    command_id: String,
    creative_set_id: String,
    advertiser_id: &'a str,
    parent_creative_set_id: &'a str,
    name: &'a str,
    #[serde(rename = "defaultTargetURL")]
    default_target_url: &'a str,
    product_category_id: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkBody<'a> {
    command_id: String,
    creative_id: String,
    creative_set_id: &'a str,
    name: &'a str,
    content: &'a str,
    description: &'a str,
    target_url: &'a str,
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Presentation<'a> {
    alt_tag: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateImageBody<'a> {
    command_id: String,
    creative_id: String,
    creative_set_id: &'a str,
    name: &'a str,
    base64: &'a str,
    presentation: Presentation<'a>,
    target_url: &'a str,
    status: &'static str,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_folders(
        &self,
        advertiser_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<FolderSet>, CatalogError> {
        tracing::info!(advertiser_id, "[CLIENT] Listing folders");
        let value = self
            .get_json(LIST_SETS, &[("advertiserId", advertiser_id)], credentials)
            .await?;
        let folders = parse_folder_list(value, LIST_SETS)?;
        tracing::info!(count = folders.len(), "[CLIENT] Folders listed");
        Ok(folders)
    }

    async fn list_children(
        &self,
        advertiser_id: &str,
        parent_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<FolderSet>, CatalogError> {
        tracing::info!(advertiser_id, parent_id, "[CLIENT] Listing child folders");
        let value = self
            .get_json(
                LIST_SETS,
                &[("advertiserId", advertiser_id), ("creativeSetId", parent_id)],
                credentials,
            )
            .await?;
        parse_folder_list(value, LIST_SETS)
    }

    async fn get_folder(
        &self,
        folder_id: &str,
        credentials: &Credentials,
    ) -> Result<FolderSet, CatalogError> {
        tracing::info!(folder_id, "[CLIENT] Fetching folder");
        let value = self
            .get_json(GET_SINGLE_SET, &[("creativeSetId", folder_id)], credentials)
            .await?;
        let mut folder: FolderSet = serde_json::from_value(value)
            .map_err(|e| CatalogError::Malformed(format!("{GET_SINGLE_SET}: {e}")))?;
        if folder.id.is_empty() {
            folder.id = folder_id.to_string();
        }
        Ok(folder)
    }

    async fn create_folder(
        &self,
        folder: NewFolderSet,
        credentials: &Credentials,
    ) -> Result<String, CatalogError> {
        let folder_id = new_id();
        let body = CreateFolderBody {
            command_id: new_id(),
            creative_set_id: folder_id.clone(),
            advertiser_id: &folder.advertiser_id,
            parent_creative_set_id: &folder.parent_id,
            name: &folder.name,
            default_target_url: &folder.default_target_url,
            product_category_id: &folder.product_category_id,
        };
        tracing::info!(name = %folder.name, folder_id = %folder_id, "[CLIENT] Creating folder");
        self.post_json(CREATE_SET, &body, credentials).await?;
        Ok(folder_id)
    }

    async fn create_creative(
        &self,
        creative: NewCreative,
        credentials: &Credentials,
    ) -> Result<String, CatalogError> {
        let creative_id = new_id();
        tracing::info!(name = %creative.name, folder_id = %creative.folder_id, "[CLIENT] Creating creative");
        let response = match &creative.body {
            CreativeBody::Link {
                content,
                description,
            } => {
                let body = CreateLinkBody {
                    command_id: new_id(),
                    creative_id: creative_id.clone(),
                    creative_set_id: &creative.folder_id,
                    name: &creative.name,
                    content,
                    description,
                    target_url: &creative.target_url,
                    status: ACTIVE,
                };
                self.post_json(CREATE_LINK_CREATIVE, &body, credentials).await?
            }
            CreativeBody::Image { data_uri, alt_tag } => {
                let body = CreateImageBody {
                    command_id: new_id(),
                    creative_id: creative_id.clone(),
                    creative_set_id: &creative.folder_id,
                    name: &creative.name,
                    base64: data_uri,
                    presentation: Presentation { alt_tag },
                    target_url: &creative.target_url,
                    status: ACTIVE,
                };
                self.post_json(CREATE_IMAGE_CREATIVE, &body, credentials).await?
            }
        };
        Ok(response
            .get("creativeId")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or(creative_id))
    }
}

/// Downloads payload archives with a plain GET.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        tracing::info!(url, "[CLIENT] Downloading archive");
        let response = self.client.get(url).send().await.map_err(|e| CatalogError::Transport {
            status: None,
            message: format!("HTTP request failed: {e}"),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Transport {
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or("download failed").to_string(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| CatalogError::Transport {
            status: Some(status.as_u16()),
            message: format!("reading body failed: {e}"),
        })?;
        tracing::info!(url, size = bytes.len(), "[CLIENT] Archive downloaded");
        Ok(bytes.to_vec())
    }
}
