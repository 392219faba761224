// creative-provisioner/src/config.rs

use std::time::Duration;

use anyhow::{Context, Result};
use creative_provisioner_core::archive::DEFAULT_MAX_ENTRY_BYTES;
use creative_provisioner_core::decorate::{AppendQuery, DecorationRegistry};
use creative_provisioner_core::provision::{CreativeKind, ProvisionSettings, LINK_DESCRIPTION};
use creative_provisioner_core::resolve::FolderPredicate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub max_entry_bytes: u64,
    pub link_description: String,
    pub folders: FolderSection,
    /// Keep the built-in advertiser rules.
    pub builtin_decorations: bool,
    pub decorations: Vec<DecorationRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            link_description: LINK_DESCRIPTION.to_string(),
            folders: FolderSection::default(),
            builtin_decorations: true,
            decorations: Vec::new(),
        }
    }
}

/// How the parent folder is recognised for each creative kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSection {
    pub link: FolderMatch,
    pub display: FolderMatch,
}

/// Exactly one of `pattern` / `exact`; neither means the built-in pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderMatch {
    pub pattern: Option<String>,
    pub exact: Option<String>,
}

impl FolderMatch {
    fn predicate(&self, kind: CreativeKind) -> Result<FolderPredicate> {
        match (&self.pattern, &self.exact) {
            (Some(_), Some(_)) => anyhow::bail!(
                "folders.{kind}: set either `pattern` or `exact`, not both"
            ),
            (None, Some(name)) => Ok(FolderPredicate::exact(name.clone())),
            (Some(pattern), None) => FolderPredicate::pattern(pattern)
                .with_context(|| format!("folders.{kind}: invalid pattern {pattern:?}")),
            (None, None) => FolderPredicate::pattern(kind.default_folder_pattern())
                .with_context(|| format!("built-in {kind} pattern failed to compile")),
        }
    }
}

/// Query appended to target URLs of one advertiser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecorationRule {
    pub advertiser_id: String,
    pub query: String,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            api_base_url = %self.api_base_url,
            timeout_secs = self.timeout_secs,
            max_entry_bytes = self.max_entry_bytes,
            decorations = self.decorations.len(),
            builtin_decorations = self.builtin_decorations,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn provision_settings(&self) -> Result<ProvisionSettings> {
        Ok(ProvisionSettings {
            max_entry_bytes: self.max_entry_bytes,
            link_folder: self.folders.link.predicate(CreativeKind::Link)?,
            display_folder: self.folders.display.predicate(CreativeKind::Display)?,
            link_description: self.link_description.clone(),
        })
    }

    /// Built-in rules (unless disabled) overlaid with the configured ones.
    pub fn decoration_registry(&self) -> DecorationRegistry {
        let mut registry = if self.builtin_decorations {
            DecorationRegistry::with_builtin_rules()
        } else {
            DecorationRegistry::empty()
        };
        for rule in &self.decorations {
            registry.register(rule.advertiser_id.clone(), AppendQuery::new(rule.query.clone()));
        }
        registry
    }
}
