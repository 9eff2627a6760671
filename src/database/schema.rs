//! Relational schema mirroring the ORCID record shape.
//!
//! Statements are idempotent so `migrate` can run on every start.

use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;

pub const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        orcid_id        TEXT PRIMARY KEY CHECK (orcid_id ~ '^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$'),
        given_names     TEXT,
        family_name     TEXT,
        credit_name     TEXT,
        institution     TEXT,
        biography       TEXT,
        email           TEXT,
        registered_at   TIMESTAMPTZ,
        last_synced_at  TIMESTAMPTZ,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    // Sign-in stubs carry no registered_at until the profile is created or synced
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS registered_at TIMESTAMPTZ",
    r#"CREATE TABLE IF NOT EXISTS research_areas (
        id          BIGSERIAL PRIMARY KEY,
        orcid_id    TEXT NOT NULL REFERENCES users(orcid_id) ON DELETE CASCADE,
        position    INTEGER NOT NULL DEFAULT 0,
        area        TEXT NOT NULL
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS research_areas_owner_area_idx ON research_areas (orcid_id, lower(area))",
    r#"CREATE TABLE IF NOT EXISTS external_links (
        id          BIGSERIAL PRIMARY KEY,
        orcid_id    TEXT NOT NULL REFERENCES users(orcid_id) ON DELETE CASCADE,
        position    INTEGER NOT NULL DEFAULT 0,
        name        TEXT NOT NULL,
        url         TEXT NOT NULL,
        UNIQUE (orcid_id, url)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS works (
        id                  UUID PRIMARY KEY,
        owner_orcid         TEXT NOT NULL REFERENCES users(orcid_id) ON DELETE CASCADE,
        put_code            BIGINT,
        title               TEXT NOT NULL,
        publication_year    INTEGER,
        work_type           TEXT NOT NULL DEFAULT 'other',
        source              TEXT,
        identifier_type     TEXT,
        identifier_value    TEXT,
        url                 TEXT,
        journal_title       TEXT,
        description         TEXT,
        created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (owner_orcid, put_code)
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS works_owner_title_idx ON works (owner_orcid, lower(btrim(title)))",
    r#"CREATE TABLE IF NOT EXISTS work_authors (
        id          BIGSERIAL PRIMARY KEY,
        work_id     UUID NOT NULL REFERENCES works(id) ON DELETE CASCADE,
        position    INTEGER NOT NULL,
        name        TEXT NOT NULL,
        orcid_id    TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS work_authors_work_idx ON work_authors (work_id, position)",
    "CREATE INDEX IF NOT EXISTS work_authors_orcid_idx ON work_authors (orcid_id)",
    r#"CREATE TABLE IF NOT EXISTS projects (
        id              UUID PRIMARY KEY,
        owner_orcid     TEXT NOT NULL REFERENCES users(orcid_id) ON DELETE CASCADE,
        put_code        BIGINT,
        name            TEXT NOT NULL,
        start_year      INTEGER,
        start_month     INTEGER CHECK (start_month BETWEEN 1 AND 12),
        end_year        INTEGER,
        end_month       INTEGER CHECK (end_month BETWEEN 1 AND 12),
        funding_agency  TEXT,
        funding_amount  NUMERIC(18, 2) CHECK (funding_amount >= 0),
        currency        TEXT CHECK (currency ~ '^[A-Z]{3}$'),
        role            TEXT,
        description     TEXT,
        url             TEXT,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (owner_orcid, put_code)
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS projects_owner_name_idx ON projects (owner_orcid, lower(btrim(name)))",
    r#"CREATE TABLE IF NOT EXISTS user_projects (
        orcid_id    TEXT NOT NULL REFERENCES users(orcid_id) ON DELETE CASCADE,
        project_id  UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        role        TEXT,
        PRIMARY KEY (orcid_id, project_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS work_projects (
        work_id     UUID NOT NULL REFERENCES works(id) ON DELETE CASCADE,
        project_id  UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        PRIMARY KEY (work_id, project_id)
    )"#,
];

/// Apply the schema in one transaction
pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await?;
    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Database schema is up to date ({} statements)", STATEMENTS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_is_idempotent() {
        for statement in STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "statement would fail on re-run: {statement}"
            );
        }
    }

    #[test]
    fn tables_are_created_before_their_references() {
        let position = |needle: &str| {
            STATEMENTS
                .iter()
                .position(|s| s.contains(needle))
                .unwrap_or_else(|| panic!("missing {needle}"))
        };
        assert!(position("TABLE IF NOT EXISTS users") < position("TABLE IF NOT EXISTS works"));
        assert!(position("TABLE IF NOT EXISTS works") < position("TABLE IF NOT EXISTS work_authors"));
        assert!(position("TABLE IF NOT EXISTS projects") < position("TABLE IF NOT EXISTS work_projects"));
    }
}
