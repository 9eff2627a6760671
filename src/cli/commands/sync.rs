use tracing::warn;

use crate::cli::utils::output_data;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::orcid::OrcidId;
use crate::services::SyncService;

pub async fn handle(orcid: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let orcid_id = OrcidId::parse(orcid)?;
    let result = SyncService::connect().await?.sync(&orcid_id).await;
    DatabaseManager::close().await;
    let report = result?;

    // Warnings stay in the report; stderr only, so --json output is one document
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    output_data(
        output_format,
        &format!(
            "Synced {}: {} works added, {} updated, {} removed; {} projects added, {} updated, {} removed",
            report.orcid_id,
            report.works_inserted,
            report.works_updated,
            report.works_removed,
            report.projects_inserted,
            report.projects_updated,
            report.projects_removed
        ),
        &report,
    )
}
