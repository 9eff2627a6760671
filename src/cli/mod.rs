pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "orcidpp")]
#[command(about = "ORCID++ CLI - schema setup, live ORCID lookups and profile sync")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create or update the database schema")]
    Migrate,

    #[command(about = "Fetch a live profile from ORCID")]
    Lookup {
        #[arg(help = "ORCID iD, bare or as https://orcid.org/ URI")]
        orcid: String,
    },

    #[command(about = "Search the ORCID registry, following every result page")]
    Search(commands::search::SearchArgs),

    #[command(about = "Pull a researcher's ORCID record into the local database")]
    Sync {
        #[arg(help = "ORCID iD to sync")]
        orcid: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Lookup { orcid } => commands::lookup::handle(&orcid, output_format).await,
        Commands::Search(args) => commands::search::handle(args, output_format).await,
        Commands::Sync { orcid } => commands::sync::handle(&orcid, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["orcidpp", "lookup", "0000-0002-1825-0097", "--json"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Lookup { ref orcid } if orcid == "0000-0002-1825-0097"));
    }

    #[test]
    fn search_accepts_structured_fields() {
        let cli = Cli::try_parse_from([
            "orcidpp", "search", "--family-name", "Carberry", "--affiliation", "Brown University", "--max", "50",
        ])
        .unwrap();
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, None);
                assert_eq!(args.family_name.as_deref(), Some("Carberry"));
                assert_eq!(args.max, Some(50));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn text_is_the_default_output() {
        let cli = Cli::try_parse_from(["orcidpp", "migrate"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Text));
    }
}
