//! Provisioning workflow: one input record in, one [`ProvisioningResult`] out.
//!
//! The workflow runs a fixed sequence of stages for a single
//! [`ProvisioningRequest`]:
//!   - validate the request (no remote call is made when this fails)
//!   - decorate the target URL through the advertiser rule table
//!   - resolve the parent folder for the [`CreativeKind`]
//!   - read the parent's product category
//!   - list the parent's children and allocate the next folder number
//!   - for display creatives, download and open the payload archive
//!   - create the numbered subfolder
//!   - create the creative(s) inside it
//!
//! # Error Handling
//! Every stage up to and including folder creation is fail-fast: the first
//! error ends the request with a failure result naming the stage. Creative
//! creation is different for display payloads, where each archive entry is
//! attempted independently and failures are collected next to successes.
//! [`Provisioner::provision`] never returns an error, so a batch driver can
//! always move on to the next record.
//!
//! # Concurrency
//! Requests must be provisioned one at a time per parent folder. The folder
//! number is computed from the sibling list read just before the folder is
//! created, so two in-flight requests against the same parent would collide.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn, Instrument};

use crate::archive::{PayloadArchive, DEFAULT_MAX_ENTRY_BYTES};
use crate::contract::{
    ArchiveFetcher, CatalogClient, CatalogError, CreativeBody, Credentials, NewCreative,
    NewFolderSet,
};
use crate::decorate::DecorationRegistry;
use crate::resolve::{resolve_folder, FolderPredicate};
use crate::sequence::{build_folder_name, next_sequence};

/// Description attached to every link creative.
pub const LINK_DESCRIPTION: &str = "Creative created automatically by creative-provisioner";

/// Content of a link creative.
pub const LINK_CONTENT: &str = ".";

/// The two creative flavours the workflow can provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CreativeKind {
    /// A single text link creative.
    Link,
    /// One hosted image creative per file in a ZIP archive.
    Display,
}

impl CreativeKind {
    /// Pattern used to find the parent folder when none is configured.
    pub fn default_folder_pattern(self) -> &'static str {
        match self {
            CreativeKind::Link => "link",
            CreativeKind::Display => "display",
        }
    }

    /// Prefix of the creative name reported for the new folder.
    pub fn creative_prefix(self) -> &'static str {
        match self {
            CreativeKind::Link => "LinkTXT",
            CreativeKind::Display => "Display",
        }
    }

    pub fn requires_payload(self) -> bool {
        matches!(self, CreativeKind::Display)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CreativeKind::Link => "link",
            CreativeKind::Display => "display",
        }
    }
}

impl fmt::Display for CreativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreativeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "link" | "link_txt" | "linktxt" => Ok(CreativeKind::Link),
            "display" | "image" => Ok(CreativeKind::Display),
            other => Err(format!("unknown creative kind: {other}")),
        }
    }
}

/// One logical provisioning request, usually built from a spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub advertiser_id: String,
    pub creative_name: String,
    pub campaign_period: Option<String>,
    pub target_url: String,
    /// Archive URL with the display files. Ignored for link creatives.
    pub payload_source: Option<String>,
}

/// Final state of a provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

/// What happened to one request.
///
/// `success` is true exactly when at least one creative was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResult {
    pub success: bool,
    pub outcome: Outcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_folder_name: Option<String>,
    pub created_creative_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ProvisioningResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: Outcome::Failure,
            message: message.into(),
            created_folder_id: None,
            created_folder_name: None,
            created_creative_ids: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Workflow stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    ResolvingFolder,
    ReadingCategory,
    ComputingName,
    FetchingPayload,
    CreatingFolder,
    CreatingCreatives,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Validating => "validating request",
            Stage::ResolvingFolder => "resolving parent folder",
            Stage::ReadingCategory => "reading product category",
            Stage::ComputingName => "computing folder name",
            Stage::FetchingPayload => "fetching payload archive",
            Stage::CreatingFolder => "creating folder",
            Stage::CreatingCreatives => "creating creatives",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Reasons a request fails before any creative is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid API key or insufficient permissions")]
    Unauthorized,
    #[error("{0}")]
    Transport(String),
    #[error("remote application error: {0}")]
    RemoteApplication(String),
    #[error("archive error: {0}")]
    Archive(String),
}

impl From<CatalogError> for ProvisionError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Unauthorized => ProvisionError::Unauthorized,
            CatalogError::RemoteApplication(errors) => {
                ProvisionError::RemoteApplication(errors.join("; "))
            }
            other @ (CatalogError::Transport { .. } | CatalogError::Malformed(_)) => {
                ProvisionError::Transport(other.to_string())
            }
        }
    }
}

/// Tunables of the workflow.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub max_entry_bytes: u64,
    pub link_folder: FolderPredicate,
    pub display_folder: FolderPredicate,
    pub link_description: String,
}

impl ProvisionSettings {
    pub fn folder_predicate(&self, kind: CreativeKind) -> &FolderPredicate {
        match kind {
            CreativeKind::Link => &self.link_folder,
            CreativeKind::Display => &self.display_folder,
        }
    }
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        let pattern = |kind: CreativeKind| {
            FolderPredicate::pattern(kind.default_folder_pattern())
                .unwrap_or_else(|_| FolderPredicate::exact(kind.default_folder_pattern()))
        };
        Self {
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            link_folder: pattern(CreativeKind::Link),
            display_folder: pattern(CreativeKind::Display),
            link_description: LINK_DESCRIPTION.to_string(),
        }
    }
}

/// Checks the request shape for a given kind, listing every problem found.
pub fn validate_request(request: &ProvisioningRequest, kind: CreativeKind) -> Result<(), ProvisionError> {
    let mut problems = Vec::new();
    if request.advertiser_id.trim().is_empty() {
        problems.push("advertiserId is missing".to_string());
    }
    if request.creative_name.trim().is_empty() {
        problems.push("creativeName is missing".to_string());
    }
    if request.target_url.trim().is_empty() {
        problems.push("targetUrl is missing".to_string());
    }
    if kind.requires_payload() {
        match request.payload_source.as_deref().map(str::trim) {
            None | Some("") => problems.push("payloadSource (ZIP URL) is missing".to_string()),
            Some(source) if !is_absolute_http_url(source) => problems.push(format!(
                "payloadSource \"{source}\" is not an absolute http(s) URL"
            )),
            Some(_) => {}
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::Validation(problems))
    }
}

fn is_absolute_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

struct StageFailure {
    stage: Stage,
    error: ProvisionError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T, E: Into<ProvisionError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

enum Payload {
    Link,
    Display(PayloadArchive),
}

struct PreparedFolder {
    folder_id: String,
    folder_name: String,
    target_url: String,
    payload: Payload,
}

/// Runs the provisioning workflow against a catalog.
pub struct Provisioner<C, F> {
    catalog: C,
    archives: F,
    decorations: DecorationRegistry,
    settings: ProvisionSettings,
}

impl<C, F> Provisioner<C, F>
where
    C: CatalogClient,
    F: ArchiveFetcher,
{
    /// Creates a provisioner with the built-in URL rules and default settings.
    pub fn new(catalog: C, archives: F) -> Self {
        Self {
            catalog,
            archives,
            decorations: DecorationRegistry::with_builtin_rules(),
            settings: ProvisionSettings::default(),
        }
    }

    pub fn with_decorations(mut self, decorations: DecorationRegistry) -> Self {
        self.decorations = decorations;
        self
    }

    pub fn with_settings(mut self, settings: ProvisionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    /// Provisions one request. Failures are reported in the result, never raised.
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
        kind: CreativeKind,
        credentials: &Credentials,
    ) -> ProvisioningResult {
        let span = tracing::info_span!(
            "provision",
            advertiser_id = %request.advertiser_id,
            creative = %request.creative_name,
            %kind
        );
        async move {
            info!("[PROVISION] Starting");
            let result = match self.prepare(request, kind, credentials).await {
                Ok(prepared) => self.create_creatives(kind, prepared, credentials).await,
                Err(StageFailure { stage, error }) => {
                    error!(%stage, %error, "[PROVISION][ERROR] Aborted");
                    ProvisioningResult::failure(format!(
                        "Creative \"{}\" was not created ({stage}): {error}",
                        request.creative_name
                    ))
                }
            };
            info!(stage = %Stage::Done, outcome = ?result.outcome, "[PROVISION] Finished");
            result
        }
        .instrument(span)
        .await
    }

    async fn prepare(
        &self,
        request: &ProvisioningRequest,
        kind: CreativeKind,
        credentials: &Credentials,
    ) -> Result<PreparedFolder, StageFailure> {
        info!(stage = %Stage::Validating, "[PROVISION]");
        validate_request(request, kind).at(Stage::Validating)?;

        let advertiser_id = request.advertiser_id.trim();
        let target_url = self
            .decorations
            .decorate(advertiser_id, request.target_url.trim());

        info!(stage = %Stage::ResolvingFolder, "[PROVISION]");
        let parent = resolve_folder(
            &self.catalog,
            advertiser_id,
            self.settings.folder_predicate(kind),
            credentials,
        )
        .await
        .at(Stage::ResolvingFolder)?;

        info!(stage = %Stage::ReadingCategory, parent_id = %parent.id, "[PROVISION]");
        let product_category_id = self.read_category(&parent.id, credentials).await?;

        info!(stage = %Stage::ComputingName, "[PROVISION]");
        let children = match self
            .catalog
            .list_children(advertiser_id, &parent.id, credentials)
            .await
        {
            Ok(children) => children,
            Err(CatalogError::Malformed(reason)) => {
                warn!(%reason, "[PROVISION] Child list malformed, numbering from 1");
                Vec::new()
            }
            Err(e) => {
                return Err(StageFailure {
                    stage: Stage::ComputingName,
                    error: e.into(),
                })
            }
        };
        let sequence = next_sequence(children.iter().map(|c| c.name.as_str()));
        let folder_name = build_folder_name(
            sequence,
            request.creative_name.trim(),
            request.campaign_period.as_deref(),
        );
        info!(sequence, folder_name = %folder_name, "[PROVISION] Folder name allocated");

        let payload = match kind {
            CreativeKind::Link => Payload::Link,
            CreativeKind::Display => {
                info!(stage = %Stage::FetchingPayload, "[PROVISION]");
                let source = request.payload_source.as_deref().unwrap_or_default().trim();
                let bytes = self.archives.fetch(source).await.map_err(|e| StageFailure {
                    stage: Stage::FetchingPayload,
                    error: ProvisionError::Archive(format!("download of {source} failed: {e}")),
                })?;
                let archive = PayloadArchive::open(bytes).map_err(|e| StageFailure {
                    stage: Stage::FetchingPayload,
                    error: ProvisionError::Archive(format!("{source} is not a readable ZIP: {e}")),
                })?;
                info!(entries = archive.len(), "[PROVISION] Payload archive opened");
                Payload::Display(archive)
            }
        };

        info!(stage = %Stage::CreatingFolder, "[PROVISION]");
        let folder_id = self
            .catalog
            .create_folder(
                NewFolderSet {
                    advertiser_id: advertiser_id.to_string(),
                    parent_id: parent.id.clone(),
                    name: folder_name.clone(),
                    default_target_url: target_url.clone(),
                    product_category_id,
                },
                credentials,
            )
            .await
            .at(Stage::CreatingFolder)?;
        info!(folder_id = %folder_id, "[PROVISION] Folder created");

        Ok(PreparedFolder {
            folder_id,
            folder_name,
            target_url,
            payload,
        })
    }

    async fn read_category(
        &self,
        parent_id: &str,
        credentials: &Credentials,
    ) -> Result<Value, StageFailure> {
        let parent = self
            .catalog
            .get_folder(parent_id, credentials)
            .await
            .at(Stage::ReadingCategory)?;
        parent.category_id().cloned().ok_or_else(|| StageFailure {
            stage: Stage::ReadingCategory,
            error: ProvisionError::NotFound(format!(
                "folder \"{}\" has no productCategoryId",
                parent.name
            )),
        })
    }

    async fn create_creatives(
        &self,
        kind: CreativeKind,
        prepared: PreparedFolder,
        credentials: &Credentials,
    ) -> ProvisioningResult {
        info!(stage = %Stage::CreatingCreatives, folder_id = %prepared.folder_id, "[PROVISION]");
        let creative_label = format!("{} - {}", kind.creative_prefix(), prepared.folder_name);
        let mut created: Vec<(String, String)> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        match prepared.payload {
            Payload::Link => {
                let creative = NewCreative {
                    folder_id: prepared.folder_id.clone(),
                    name: creative_label.clone(),
                    target_url: prepared.target_url.clone(),
                    body: CreativeBody::Link {
                        content: LINK_CONTENT.to_string(),
                        description: self.settings.link_description.clone(),
                    },
                };
                match self.catalog.create_creative(creative, credentials).await {
                    Ok(id) => {
                        info!(creative_id = %id, "[PROVISION] Link creative created");
                        created.push((creative_label.clone(), id));
                    }
                    Err(e) => {
                        error!(error = %e, "[PROVISION][ERROR] Link creative failed");
                        errors.push(format!("creating \"{creative_label}\" failed: {e}"));
                    }
                }
            }
            Payload::Display(mut archive) => {
                for entry in archive.payloads(self.settings.max_entry_bytes) {
                    let payload = match entry {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(file = %e.file_name(), error = %e, "[PROVISION] Entry rejected");
                            errors.push(e.to_string());
                            continue;
                        }
                    };
                    let creative = NewCreative {
                        folder_id: prepared.folder_id.clone(),
                        name: payload.file_name.clone(),
                        target_url: prepared.target_url.clone(),
                        body: CreativeBody::Image {
                            data_uri: payload.data_uri,
                            alt_tag: payload.file_name.clone(),
                        },
                    };
                    match self.catalog.create_creative(creative, credentials).await {
                        Ok(id) => {
                            info!(file = %payload.file_name, creative_id = %id, "[PROVISION] Display creative created");
                            created.push((payload.file_name, id));
                        }
                        Err(e) => {
                            error!(file = %payload.file_name, error = %e, "[PROVISION][ERROR] Display creative failed");
                            errors.push(format!("creating \"{}\" failed: {e}", payload.file_name));
                        }
                    }
                }
                if created.is_empty() && errors.is_empty() {
                    errors.push("archive contains no files to upload".to_string());
                }
            }
        }

        summarise(kind, creative_label, prepared.folder_id, prepared.folder_name, created, errors)
    }
}

fn summarise(
    kind: CreativeKind,
    creative_label: String,
    folder_id: String,
    folder_name: String,
    created: Vec<(String, String)>,
    errors: Vec<String>,
) -> ProvisioningResult {
    let outcome = match (created.is_empty(), errors.is_empty()) {
        (false, true) => Outcome::Success,
        (false, false) => Outcome::Partial,
        (true, _) => Outcome::Failure,
    };

    let mut lines = Vec::new();
    if created.is_empty() {
        lines.push(format!(
            "Folder \"{folder_name}\" was created but no creative could be added."
        ));
    } else {
        match kind {
            CreativeKind::Link => lines.push(format!(
                "Created creative \"{creative_label}\" in folder \"{folder_name}\"."
            )),
            CreativeKind::Display => {
                let files: Vec<&str> = created.iter().map(|(name, _)| name.as_str()).collect();
                lines.push(format!(
                    "Created creative \"{creative_label}\". Files: {}.",
                    files.join(", ")
                ));
            }
        }
    }
    lines.extend(errors.iter().map(|e| format!("error: {e}")));

    ProvisioningResult {
        success: !created.is_empty(),
        outcome,
        message: lines.join("\n"),
        created_folder_id: Some(folder_id),
        created_folder_name: Some(folder_name),
        created_creative_ids: created.into_iter().map(|(_, id)| id).collect(),
        errors,
    }
}
