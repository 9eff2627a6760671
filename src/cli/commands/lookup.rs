use crate::cli::utils::output_data;
use crate::cli::OutputFormat;
use crate::orcid::mapping::profile_from_record;
use crate::orcid::{OrcidClient, OrcidId};

pub async fn handle(orcid: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let orcid_id = OrcidId::parse(orcid)?;
    let record = OrcidClient::shared()?.record(&orcid_id).await?;
    let profile = profile_from_record(&orcid_id, &record);

    output_data(
        output_format,
        &format!(
            "{} ({}): {} publications, {} projects",
            profile.display_name,
            orcid_id,
            profile.publications.len(),
            profile.projects.len()
        ),
        &profile,
    )
}
