use anyhow::Context;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::{schema, DatabaseManager};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await.context("connecting to DATABASE_URL")?;
    schema::migrate(&pool).await.context("applying schema")?;
    DatabaseManager::close().await;

    output_success(
        output_format,
        &format!("Schema is up to date ({} statements applied)", schema::STATEMENTS.len()),
    )
}
