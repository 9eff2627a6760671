use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::info;

use crate::database::models::{ExternalLink, Researcher, ResearcherInput, ResearcherProfile};
use crate::database::DatabaseManager;
use crate::filter::{contains_pattern, FilterOrder, FilterOrderInfo, ListQuery, Page, SortDirection, SortSpec};
use crate::orcid::OrcidId;

use super::error::ServiceError;
use super::validation::normalize_researcher;

pub const RESEARCHER_SORT: SortSpec = SortSpec {
    fields: &[
        ("family_name", "u.family_name"),
        ("given_names", "u.given_names"),
        ("institution", "u.institution"),
        ("created_at", "u.created_at"),
    ],
    default: &[
        FilterOrderInfo { column: "u.family_name", sort: SortDirection::Asc },
        FilterOrderInfo { column: "u.given_names", sort: SortDirection::Asc },
    ],
};

pub struct ResearcherService {
    pool: PgPool,
}

impl ResearcherService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect() -> Result<Self, ServiceError> {
        Ok(Self::new(DatabaseManager::pool().await?))
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Page<ResearcherProfile>, ServiceError> {
        let pagination = query.pagination();
        let order = FilterOrder::parse(query.sort.as_deref(), &RESEARCHER_SORT)?;

        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT u.* FROM users u");
        push_filters(&mut select, query);
        select.push(" ");
        select.push(FilterOrder::generate(&order));
        select.push(", u.orcid_id LIMIT ");
        select.push_bind(pagination.limit());
        select.push(" OFFSET ");
        select.push_bind(pagination.offset());
        let researchers: Vec<Researcher> = select.build_query_as().fetch_all(&mut *conn).await?;

        let items = hydrate(&mut conn, researchers).await?;
        Ok(Page::new(items, total, &pagination))
    }

    pub async fn get(&self, orcid_id: &OrcidId) -> Result<ResearcherProfile, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        load_profile(&mut conn, orcid_id.as_str()).await
    }

    /// Creates a minimal user row on first sign-in; existing profiles are untouched.
    pub async fn ensure_stub(&self, orcid_id: &OrcidId, name: Option<&str>) -> Result<bool, ServiceError> {
        let result = sqlx::query("INSERT INTO users (orcid_id, credit_name) VALUES ($1, $2) ON CONFLICT (orcid_id) DO NOTHING")
            .bind(orcid_id.as_str())
            .bind(name.map(str::trim).filter(|n| !n.is_empty()))
            .execute(&self.pool)
            .await?;
        let created = result.rows_affected() == 1;
        if created {
            info!("Created user stub for {}", orcid_id);
        }
        Ok(created)
    }

    /// Registers a researcher. The ORCID iD is taken from the session, never from the body.
    ///
    /// A stub left by sign-in is claimed; a registered or synced profile is a conflict.
    pub async fn create(&self, orcid_id: &OrcidId, input: ResearcherInput) -> Result<ResearcherProfile, ServiceError> {
        let input = normalize_researcher(input)?;
        ensure_body_matches(orcid_id, &input)?;

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(CLAIM_PROFILE_SQL)
        .bind(orcid_id.as_str())
        .bind(&input.given_names)
        .bind(&input.family_name)
        .bind(&input.credit_name)
        .bind(&input.institution)
        .bind(&input.biography)
        .bind(&input.email)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(ServiceError::Conflict(format!("Researcher {} is already registered", orcid_id)));
        }

        replace_areas(&mut tx, orcid_id.as_str(), input.research_areas.as_deref().unwrap_or_default()).await?;
        replace_links(&mut tx, orcid_id.as_str(), input.external_links.as_deref().unwrap_or_default()).await?;

        let profile = load_profile(&mut tx, orcid_id.as_str()).await?;
        tx.commit().await?;

        info!("Registered researcher {}", orcid_id);
        Ok(profile)
    }

    pub async fn update(&self, orcid_id: &OrcidId, input: ResearcherInput) -> Result<ResearcherProfile, ServiceError> {
        let input = normalize_researcher(input)?;
        ensure_body_matches(orcid_id, &input)?;

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"UPDATE users SET
                   given_names = $2,
                   family_name = $3,
                   credit_name = $4,
                   institution = $5,
                   biography = $6,
                   email = $7,
                   updated_at = now()
               WHERE orcid_id = $1"#,
        )
        .bind(orcid_id.as_str())
        .bind(&input.given_names)
        .bind(&input.family_name)
        .bind(&input.credit_name)
        .bind(&input.institution)
        .bind(&input.biography)
        .bind(&input.email)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(not_found(orcid_id.as_str()));
        }

        if let Some(areas) = &input.research_areas {
            replace_areas(&mut tx, orcid_id.as_str(), areas).await?;
        }
        if let Some(links) = &input.external_links {
            replace_links(&mut tx, orcid_id.as_str(), links).await?;
        }

        let profile = load_profile(&mut tx, orcid_id.as_str()).await?;
        tx.commit().await?;
        Ok(profile)
    }

    /// Deletes the researcher; owned works, projects and memberships cascade.
    pub async fn delete(&self, orcid_id: &OrcidId) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE orcid_id = $1")
            .bind(orcid_id.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(orcid_id.as_str()));
        }
        info!("Deleted researcher {}", orcid_id);
        Ok(())
    }
}

const CLAIM_PROFILE_SQL: &str = r#"INSERT INTO users (orcid_id, given_names, family_name, credit_name, institution, biography, email, registered_at)
   VALUES ($1, $2, $3, $4, $5, $6, $7, now())
   ON CONFLICT (orcid_id) DO UPDATE SET
       given_names = EXCLUDED.given_names,
       family_name = EXCLUDED.family_name,
       credit_name = COALESCE(EXCLUDED.credit_name, users.credit_name),
       institution = EXCLUDED.institution,
       biography = EXCLUDED.biography,
       email = EXCLUDED.email,
       registered_at = now(),
       updated_at = now()
   WHERE users.registered_at IS NULL"#;

fn not_found(orcid_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Researcher {} not found", orcid_id))
}

fn ensure_body_matches(orcid_id: &OrcidId, input: &ResearcherInput) -> Result<(), ServiceError> {
    match input.orcid_id.as_deref() {
        Some(body) if body != orcid_id.as_str() => Err(ServiceError::BadRequest(format!(
            "Body ORCID iD {} does not match {}",
            body, orcid_id
        ))),
        _ => Ok(()),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    if let Some(term) = query.term() {
        let pattern = contains_pattern(term);
        builder.push(" WHERE (");
        let mut separated = builder.separated(" OR ");
        for column in ["u.given_names", "u.family_name", "u.credit_name", "u.institution", "u.orcid_id"] {
            separated.push(format!("{} ILIKE ", column));
            separated.push_bind_unseparated(pattern.clone());
        }
        builder.push(")");
    }
}

pub(crate) async fn ensure_researcher_exists(conn: &mut PgConnection, orcid_id: &str) -> Result<(), ServiceError> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE orcid_id = $1)")
        .bind(orcid_id)
        .fetch_one(&mut *conn)
        .await?;
    if found {
        Ok(())
    } else {
        Err(not_found(orcid_id))
    }
}

pub(crate) async fn replace_areas(conn: &mut PgConnection, orcid_id: &str, areas: &[String]) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM research_areas WHERE orcid_id = $1")
        .bind(orcid_id)
        .execute(&mut *conn)
        .await?;
    for (position, area) in areas.iter().enumerate() {
        sqlx::query("INSERT INTO research_areas (orcid_id, position, area) VALUES ($1, $2, $3)")
            .bind(orcid_id)
            .bind(position as i32)
            .bind(area)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn replace_links(conn: &mut PgConnection, orcid_id: &str, links: &[ExternalLink]) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM external_links WHERE orcid_id = $1")
        .bind(orcid_id)
        .execute(&mut *conn)
        .await?;
    for (position, link) in links.iter().enumerate() {
        sqlx::query("INSERT INTO external_links (orcid_id, position, name, url) VALUES ($1, $2, $3, $4)")
            .bind(orcid_id)
            .bind(position as i32)
            .bind(&link.name)
            .bind(&link.url)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn load_profile(conn: &mut PgConnection, orcid_id: &str) -> Result<ResearcherProfile, ServiceError> {
    let researcher: Researcher = sqlx::query_as("SELECT * FROM users WHERE orcid_id = $1")
        .bind(orcid_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(orcid_id))?;

    hydrate(conn, vec![researcher])
        .await?
        .pop()
        .ok_or_else(|| not_found(orcid_id))
}

async fn hydrate(conn: &mut PgConnection, researchers: Vec<Researcher>) -> Result<Vec<ResearcherProfile>, ServiceError> {
    if researchers.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = researchers.iter().map(|r| r.orcid_id.clone()).collect();

    let areas: Vec<(String, String)> =
        sqlx::query_as("SELECT orcid_id, area FROM research_areas WHERE orcid_id = ANY($1) ORDER BY orcid_id, position")
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await?;
    let links: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT orcid_id, name, url FROM external_links WHERE orcid_id = ANY($1) ORDER BY orcid_id, position",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut areas_by_owner: HashMap<String, Vec<String>> = HashMap::new();
    for (owner, area) in areas {
        areas_by_owner.entry(owner).or_default().push(area);
    }
    let mut links_by_owner: HashMap<String, Vec<ExternalLink>> = HashMap::new();
    for (owner, name, url) in links {
        links_by_owner.entry(owner).or_default().push(ExternalLink { name, url });
    }

    Ok(researchers
        .into_iter()
        .map(|researcher| ResearcherProfile {
            display_name: researcher.display_name(),
            research_areas: areas_by_owner.remove(&researcher.orcid_id).unwrap_or_default(),
            external_links: links_by_owner.remove(&researcher.orcid_id).unwrap_or_default(),
            researcher,
        })
        .collect())
}
