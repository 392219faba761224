//! Parent folder lookup by name.

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::contract::{CatalogClient, CatalogError, Credentials, FolderSet};
use crate::provision::ProvisionError;

/// How a parent folder is recognised among an advertiser's folders.
#[derive(Debug, Clone)]
pub enum FolderPredicate {
    /// Case-insensitive regular expression searched anywhere in the name.
    Pattern(Regex),
    /// Exact, case-sensitive name.
    ExactName(String),
}

impl FolderPredicate {
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(FolderPredicate::Pattern)
    }

    pub fn exact(name: impl Into<String>) -> Self {
        FolderPredicate::ExactName(name.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            FolderPredicate::Pattern(re) => re.is_match(name),
            FolderPredicate::ExactName(expected) => expected == name,
        }
    }
}

impl std::fmt::Display for FolderPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FolderPredicate::Pattern(re) => write!(f, "/{}/i", re.as_str()),
            FolderPredicate::ExactName(name) => write!(f, "\"{name}\""),
        }
    }
}

/// Returns the first folder, in upstream order, whose name satisfies `predicate`.
pub fn first_match<'a>(folders: &'a [FolderSet], predicate: &FolderPredicate) -> Option<&'a FolderSet> {
    let mut matching = folders.iter().filter(|f| predicate.matches(&f.name));
    let first = matching.next()?;
    let others = matching.count();
    if others > 0 {
        debug!(chosen = %first.name, others, "[RESOLVE] Several folders match, using the first");
    }
    Some(first)
}

/// Finds the parent folder for an advertiser.
///
/// A malformed folder list is reported as `NotFound`, like an empty one.
pub async fn resolve_folder<C>(
    catalog: &C,
    advertiser_id: &str,
    predicate: &FolderPredicate,
    credentials: &Credentials,
) -> Result<FolderSet, ProvisionError>
where
    C: CatalogClient + ?Sized,
{
    info!(advertiser_id, %predicate, "[RESOLVE] Looking up parent folder");
    let folders = match catalog.list_folders(advertiser_id, credentials).await {
        Ok(folders) => folders,
        Err(CatalogError::Malformed(reason)) => {
            warn!(advertiser_id, %reason, "[RESOLVE] Folder list is malformed");
            return Err(ProvisionError::NotFound(format!(
                "no folder matching {predicate} for advertiser {advertiser_id} (folder list unavailable)"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    match first_match(&folders, predicate) {
        Some(folder) => {
            info!(folder_id = %folder.id, folder_name = %folder.name, "[RESOLVE] Parent folder found");
            Ok(folder.clone())
        }
        None => {
            warn!(advertiser_id, %predicate, count = folders.len(), "[RESOLVE] No folder matches");
            Err(ProvisionError::NotFound(format!(
                "no folder matching {predicate} for advertiser {advertiser_id}"
            )))
        }
    }
}
