//! Batch driver: provisions a sequence of tabular records, one at a time.

use serde::Serialize;
use tracing::{info, warn};

use crate::contract::{ArchiveFetcher, CatalogClient, Credentials};
use crate::provision::{CreativeKind, Outcome, ProvisioningRequest, ProvisioningResult, Provisioner};

pub const COLUMN_ADVERTISER_ID: &str = "advertiserId";
pub const COLUMN_CREATIVE_NAME: &str = "creativeName";
pub const COLUMN_CAMPAIGN_PERIOD: &str = "campaignPeriod";
pub const COLUMN_TARGET_URL: &str = "targetUrl";
pub const COLUMN_PAYLOAD: &str = "displays";
pub const COLUMN_PAYLOAD_ALIAS: &str = "payloadSource";

/// One input row. Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRecord {
    pub advertiser_id: Option<String>,
    pub creative_name: Option<String>,
    pub campaign_period: Option<String>,
    pub target_url: Option<String>,
    pub payload_source: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl BatchRecord {
    /// Required columns that are blank in this record.
    pub fn missing_columns(&self, kind: CreativeKind) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.advertiser_id) {
            missing.push(COLUMN_ADVERTISER_ID);
        }
        if !present(&self.creative_name) {
            missing.push(COLUMN_CREATIVE_NAME);
        }
        if !present(&self.target_url) {
            missing.push(COLUMN_TARGET_URL);
        }
        if kind.requires_payload() && !present(&self.payload_source) {
            missing.push(COLUMN_PAYLOAD);
        }
        missing
    }

    /// Converts the record into a request, or into a failure result naming
    /// the missing columns.
    pub fn into_request(self, kind: CreativeKind) -> Result<ProvisioningRequest, ProvisioningResult> {
        let missing = self.missing_columns(kind);
        if !missing.is_empty() {
            let name = self
                .creative_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or("(unnamed)");
            return Err(ProvisioningResult::failure(format!(
                "Creative \"{name}\" was not created. Missing required columns: {}.",
                missing.join(", ")
            )));
        }

        let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).unwrap_or_default();
        Ok(ProvisioningRequest {
            advertiser_id: trimmed(self.advertiser_id),
            creative_name: trimmed(self.creative_name),
            campaign_period: self
                .campaign_period
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            target_url: trimmed(self.target_url),
            payload_source: self
                .payload_source
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        })
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub message: String,
    pub results: Vec<ProvisioningResult>,
}

impl BatchReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("input is empty or has no recognised header row")]
    EmptyInput,
}

/// Provisions every record in order, awaiting each before starting the next.
///
/// Records with missing columns are reported as failures without contacting
/// the catalog; no record can stop the batch.
pub async fn run_batch<C, F, I>(
    provisioner: &Provisioner<C, F>,
    records: I,
    kind: CreativeKind,
    credentials: &Credentials,
) -> Result<BatchReport, BatchError>
where
    C: CatalogClient,
    F: ArchiveFetcher,
    I: IntoIterator<Item = BatchRecord>,
{
    let mut records = records.into_iter().peekable();
    if records.peek().is_none() {
        warn!("[BATCH] No records to process");
        return Err(BatchError::EmptyInput);
    }

    let mut results = Vec::new();
    for (index, record) in records.enumerate() {
        let row = index + 1;
        info!(row, %kind, "[BATCH] Processing record");
        let result = match record.into_request(kind) {
            Ok(request) => provisioner.provision(&request, kind, credentials).await,
            Err(rejected) => {
                warn!(row, message = %rejected.message, "[BATCH] Record rejected");
                rejected
            }
        };
        info!(row, success = result.success, "[BATCH] Record finished");
        results.push(result);
    }

    let mut report = BatchReport {
        success: true,
        message: String::new(),
        results,
    };
    report.message = format!(
        "Processing finished: {} created, {} partially created, {} failed.",
        report.count(Outcome::Success),
        report.count(Outcome::Partial),
        report.count(Outcome::Failure)
    );
    info!(message = %report.message, "[BATCH] Done");
    Ok(report)
}
