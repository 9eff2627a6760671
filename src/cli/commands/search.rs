use clap::Args;

use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::orcid::{accumulate, build_query, OrcidClient, SearchParams};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(help = "Free-text query (ORCID Solr syntax)")]
    pub query: Option<String>,

    #[arg(long, help = "Match given names")]
    pub given_names: Option<String>,

    #[arg(long, help = "Match family name")]
    pub family_name: Option<String>,

    #[arg(long, help = "Match current or past affiliation")]
    pub affiliation: Option<String>,

    #[arg(long, help = "Match profile keyword")]
    pub keyword: Option<String>,

    #[arg(long, help = "Stop after this many results")]
    pub max: Option<u32>,
}

impl SearchArgs {
    fn params(&self) -> SearchParams {
        SearchParams {
            q: self.query.clone(),
            given_names: self.given_names.clone(),
            family_name: self.family_name.clone(),
            affiliation: self.affiliation.clone(),
            keyword: self.keyword.clone(),
        }
    }
}

pub async fn handle(args: SearchArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let query = build_query(&args.params())?;
    let settings = &config::config().orcid;
    let max = args.max.unwrap_or(settings.search_max_results).max(1);

    let outcome = accumulate(OrcidClient::shared()?, &query, settings.search_page_size, max).await?;
    if outcome.hits.is_empty() {
        return output_success(output_format, &format!("No researchers match {}", query));
    }

    let mut message = format!(
        "{} of {} researchers matching {} ({} pages)",
        outcome.hits.len(),
        outcome.num_found,
        query,
        outcome.pages_fetched
    );
    if outcome.truncated {
        message.push_str(", truncated");
    }
    output_data(output_format, &message, &outcome.hits)
}
