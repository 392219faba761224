//! # contract: catalog interface and shared data types
//!
//! This module defines the traits through which the provisioning workflow talks
//! to the remote creative-management platform ([`CatalogClient`]) and fetches
//! display payload archives ([`ArchiveFetcher`]), together with the plain data
//! types those traits exchange.
//!
//! ## Interface & Extensibility
//! - Implement [`CatalogClient`] for a concrete transport (the CLI crate ships a
//!   reqwest client) or for tests.
//! - All methods are async and take an explicit [`Credentials`] value; no
//!   implementation keeps a global API key.
//! - Errors are normalised into [`CatalogError`] so callers can tell a rejected
//!   credential apart from a network failure.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`. The generated `MockCatalogClient`
//!   and `MockArchiveFetcher` are exported behind the default
//!   `test-export-mocks` feature so integration tests in dependent crates can
//!   use them.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API key credential sent with every catalog call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// A remote folder ("creative set") as listed or fetched from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSet {
    #[serde(rename = "creativeSetId", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "parentCreativeSetId", default)]
    pub parent_id: Option<String>,
    #[serde(rename = "defaultTargetURL", default)]
    pub default_target_url: Option<String>,
    /// Opaque upstream value; may be a string or a number.
    #[serde(rename = "productCategoryId", default)]
    pub product_category_id: Option<Value>,
}

impl FolderSet {
    /// Returns the product category id when it carries a usable value.
    ///
    /// Null, empty strings, zero and `false` count as absent.
    pub fn category_id(&self) -> Option<&Value> {
        self.product_category_id.as_ref().filter(|v| match v {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.trim().is_empty(),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Value::Array(_) | Value::Object(_) => true,
        })
    }
}

/// Command for creating a new folder under an existing parent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFolderSet {
    pub advertiser_id: String,
    pub parent_id: String,
    pub name: String,
    pub default_target_url: String,
    pub product_category_id: Value,
}

/// Payload variants supported by the catalog's creative endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum CreativeBody {
    /// Text link creative.
    Link { content: String, description: String },
    /// Hosted image, sent as a `data:` URI.
    Image { data_uri: String, alt_tag: String },
}

/// Command for creating a single creative inside a folder.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCreative {
    pub folder_id: String,
    pub name: String,
    pub target_url: String,
    pub body: CreativeBody,
}

/// Transport-level failures reported by a [`CatalogClient`] or [`ArchiveFetcher`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid API key or insufficient permissions")]
    Unauthorized,
    #[error("transport failure{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("remote application error: {}", .0.join("; "))]
    RemoteApplication(Vec<String>),
    #[error("malformed response: {0}")]
    Malformed(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Operations the provisioning workflow needs from the creative catalog.
///
/// Implementations perform exactly one round trip per call. Retrying is never
/// the implementor's job.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// List the top-level folders of an advertiser, in upstream order.
    async fn list_folders(
        &self,
        advertiser_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<FolderSet>, CatalogError>;

    /// List the children of a folder.
    async fn list_children(
        &self,
        advertiser_id: &str,
        parent_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<FolderSet>, CatalogError>;

    /// Fetch a single folder by id.
    async fn get_folder(
        &self,
        folder_id: &str,
        credentials: &Credentials,
    ) -> Result<FolderSet, CatalogError>;

    /// Create a folder and return its id.
    async fn create_folder(
        &self,
        folder: NewFolderSet,
        credentials: &Credentials,
    ) -> Result<String, CatalogError>;

    /// Create a creative and return its id.
    async fn create_creative(
        &self,
        creative: NewCreative,
        credentials: &Credentials,
    ) -> Result<String, CatalogError>;
}

/// Retrieves the raw bytes of a remote payload archive.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn folder_with_category(value: Option<Value>) -> FolderSet {
        FolderSet {
            id: "f".into(),
            name: "Display".into(),
            parent_id: None,
            default_target_url: None,
            product_category_id: value,
        }
    }

    #[test]
    fn category_id_treats_falsy_values_as_absent() {
        for value in [json!(null), json!(""), json!(0), json!(false)] {
            assert!(folder_with_category(Some(value)).category_id().is_none());
        }
        assert!(folder_with_category(None).category_id().is_none());
    }

    #[test]
    fn category_id_accepts_strings_and_numbers() {
        assert_eq!(
            folder_with_category(Some(json!("cat-9"))).category_id(),
            Some(&json!("cat-9"))
        );
        assert_eq!(
            folder_with_category(Some(json!(17))).category_id(),
            Some(&json!(17))
        );
    }

    #[test]
    fn folder_set_deserializes_wire_names() {
        let folder: FolderSet = serde_json::from_value(json!({
            "creativeSetId": "abc",
            "name": "Link TXT",
            "productCategoryId": 4
        }))
        .unwrap();
        assert_eq!(folder.id, "abc");
        assert_eq!(folder.parent_id, None);
        assert_eq!(folder.category_id(), Some(&json!(4)));
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let rendered = format!("{:?}", Credentials::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }
}
