use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{Publication, PublicationInput, Work, WorkAuthor};
use crate::database::DatabaseManager;
use crate::filter::{contains_pattern, FilterOrder, FilterOrderInfo, ListQuery, Page, SortDirection, SortSpec};
use crate::orcid::mapping::normalize_type;
use crate::orcid::OrcidId;

use super::error::ServiceError;
use super::researcher_service::ensure_researcher_exists;
use super::validation::{normalize_publication, Mode};

pub const PUBLICATION_SORT: SortSpec = SortSpec {
    fields: &[
        ("title", "w.title"),
        ("year", "w.publication_year"),
        ("type", "w.work_type"),
        ("created_at", "w.created_at"),
    ],
    default: &[
        FilterOrderInfo { column: "w.publication_year", sort: SortDirection::Desc },
        FilterOrderInfo { column: "w.title", sort: SortDirection::Asc },
    ],
};

pub struct PublicationService {
    pool: PgPool,
}

impl PublicationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect() -> Result<Self, ServiceError> {
        Ok(Self::new(DatabaseManager::pool().await?))
    }

    pub async fn list_for(&self, owner: &OrcidId, query: &ListQuery) -> Result<Page<Publication>, ServiceError> {
        let pagination = query.pagination();
        let order = FilterOrder::parse(query.sort.as_deref(), &PUBLICATION_SORT)?;

        let mut conn = self.pool.acquire().await?;
        ensure_researcher_exists(&mut conn, owner.as_str()).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM works w");
        push_filters(&mut count, owner, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT w.* FROM works w");
        push_filters(&mut select, owner, query);
        select.push(" ");
        select.push(FilterOrder::generate(&order));
        select.push(", w.id LIMIT ");
        select.push_bind(pagination.limit());
        select.push(" OFFSET ");
        select.push_bind(pagination.offset());
        let works: Vec<Work> = select.build_query_as().fetch_all(&mut *conn).await?;

        let items = hydrate(&mut conn, works).await?;
        Ok(Page::new(items, total, &pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<Publication, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        load_publication(&mut conn, id).await
    }

    /// Owner ORCID iD of a publication, for authorization checks.
    pub async fn owner_of(&self, id: Uuid) -> Result<String, ServiceError> {
        sqlx::query_scalar::<_, String>("SELECT owner_orcid FROM works WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, owner: &OrcidId, input: PublicationInput) -> Result<Publication, ServiceError> {
        let input = normalize_publication(input, Mode::Api)?;

        let mut tx = self.pool.begin().await?;
        ensure_researcher_exists(&mut tx, owner.as_str()).await?;
        ensure_unique_title(&mut tx, owner.as_str(), &input.title, None).await?;

        let id = Uuid::new_v4();
        insert_work(&mut tx, id, owner.as_str(), &input).await?;
        replace_authors(&mut tx, id, &input).await?;
        if let Some(project_ids) = &input.project_ids {
            replace_project_links(&mut tx, id, owner.as_str(), project_ids).await?;
        }

        let publication = load_publication(&mut tx, id).await?;
        tx.commit().await?;

        info!("Created publication {} for {}", id, owner);
        Ok(publication)
    }

    pub async fn update(&self, id: Uuid, input: PublicationInput) -> Result<Publication, ServiceError> {
        let input = normalize_publication(input, Mode::Api)?;

        let mut tx = self.pool.begin().await?;
        let owner = sqlx::query_scalar::<_, String>("SELECT owner_orcid FROM works WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found(id))?;

        ensure_unique_title(&mut tx, &owner, &input.title, Some(id)).await?;
        update_work(&mut tx, id, &input).await?;
        replace_authors(&mut tx, id, &input).await?;
        if let Some(project_ids) = &input.project_ids {
            replace_project_links(&mut tx, id, &owner, project_ids).await?;
        }

        let publication = load_publication(&mut tx, id).await?;
        tx.commit().await?;
        Ok(publication)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM works WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        info!("Deleted publication {}", id);
        Ok(())
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Publication {} not found", id))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, owner: &OrcidId, query: &ListQuery) {
    builder.push(" WHERE w.owner_orcid = ");
    builder.push_bind(owner.to_string());
    if let Some(term) = query.term() {
        let pattern = contains_pattern(term);
        builder.push(" AND (w.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR w.journal_title ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(year) = query.year {
        builder.push(" AND w.publication_year = ");
        builder.push_bind(year);
    }
    if let Some(work_type) = query.work_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        builder.push(" AND w.work_type = ");
        builder.push_bind(normalize_type(work_type));
    }
}

/// Rejects a title already used by another work of the same owner.
pub(crate) async fn ensure_unique_title(
    conn: &mut PgConnection,
    owner: &str,
    title: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let clash: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM works WHERE owner_orcid = $1 AND lower(btrim(title)) = lower(btrim($2)) AND ($3::uuid IS NULL OR id <> $3)",
    )
    .bind(owner)
    .bind(title)
    .bind(except)
    .fetch_optional(&mut *conn)
    .await?;

    match clash {
        Some(_) => Err(ServiceError::Conflict(format!("A publication titled '{}' already exists", title))),
        None => Ok(()),
    }
}

pub(crate) async fn insert_work(
    conn: &mut PgConnection,
    id: Uuid,
    owner: &str,
    input: &PublicationInput,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"INSERT INTO works (id, owner_orcid, put_code, title, publication_year, work_type, source,
                              identifier_type, identifier_value, url, journal_title, description)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
    )
    .bind(id)
    .bind(owner)
    .bind(input.put_code)
    .bind(&input.title)
    .bind(input.publication_year)
    .bind(input.work_type.as_deref().unwrap_or("other"))
    .bind(&input.source)
    .bind(&input.identifier_type)
    .bind(&input.identifier_value)
    .bind(&input.url)
    .bind(&input.journal_title)
    .bind(&input.description)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Overwrites the descriptive fields; `put_code` only changes when the input carries one.
pub(crate) async fn update_work(conn: &mut PgConnection, id: Uuid, input: &PublicationInput) -> Result<(), ServiceError> {
    sqlx::query(
        r#"UPDATE works SET
               put_code = COALESCE($2, put_code),
               title = $3,
               publication_year = $4,
               work_type = $5,
               source = $6,
               identifier_type = $7,
               identifier_value = $8,
               url = $9,
               journal_title = $10,
               description = $11,
               updated_at = now()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(input.put_code)
    .bind(&input.title)
    .bind(input.publication_year)
    .bind(input.work_type.as_deref().unwrap_or("other"))
    .bind(&input.source)
    .bind(&input.identifier_type)
    .bind(&input.identifier_value)
    .bind(&input.url)
    .bind(&input.journal_title)
    .bind(&input.description)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn replace_authors(conn: &mut PgConnection, work_id: Uuid, input: &PublicationInput) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM work_authors WHERE work_id = $1")
        .bind(work_id)
        .execute(&mut *conn)
        .await?;

    for (position, author) in input.authors.iter().enumerate() {
        sqlx::query("INSERT INTO work_authors (work_id, position, name, orcid_id) VALUES ($1, $2, $3, $4)")
            .bind(work_id)
            .bind(position as i32)
            .bind(&author.name)
            .bind(&author.orcid_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn replace_project_links(
    conn: &mut PgConnection,
    work_id: Uuid,
    owner: &str,
    project_ids: &[Uuid],
) -> Result<(), ServiceError> {
    let mut wanted = project_ids.to_vec();
    wanted.sort();
    wanted.dedup();

    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_orcid = $1 AND id = ANY($2)")
        .bind(owner)
        .bind(&wanted)
        .fetch_one(&mut *conn)
        .await?;
    if owned != wanted.len() as i64 {
        return Err(ServiceError::field(
            "project_ids",
            "Publications can only be linked to existing projects of the same researcher",
        ));
    }

    sqlx::query("DELETE FROM work_projects WHERE work_id = $1")
        .bind(work_id)
        .execute(&mut *conn)
        .await?;
    for project_id in wanted {
        sqlx::query("INSERT INTO work_projects (work_id, project_id) VALUES ($1, $2)")
            .bind(work_id)
            .bind(project_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn load_publication(conn: &mut PgConnection, id: Uuid) -> Result<Publication, ServiceError> {
    let work: Work = sqlx::query_as("SELECT * FROM works WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(id))?;

    hydrate(conn, vec![work])
        .await?
        .pop()
        .ok_or_else(|| not_found(id))
}

/// Attaches authors and linked project ids to a batch of works, preserving order.
pub(crate) async fn hydrate(conn: &mut PgConnection, works: Vec<Work>) -> Result<Vec<Publication>, ServiceError> {
    if works.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = works.iter().map(|w| w.id).collect();

    let authors: Vec<WorkAuthor> = sqlx::query_as(
        r#"SELECT a.work_id, a.position, a.name, a.orcid_id,
                  EXISTS (SELECT 1 FROM users u WHERE u.orcid_id = a.orcid_id) AS registered
           FROM work_authors a
           WHERE a.work_id = ANY($1)
           ORDER BY a.work_id, a.position"#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let links: Vec<(Uuid, Uuid)> =
        sqlx::query_as("SELECT work_id, project_id FROM work_projects WHERE work_id = ANY($1) ORDER BY project_id")
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await?;

    let mut authors_by_work: HashMap<Uuid, Vec<WorkAuthor>> = HashMap::new();
    for author in authors {
        authors_by_work.entry(author.work_id).or_default().push(author);
    }
    let mut projects_by_work: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (work_id, project_id) in links {
        projects_by_work.entry(work_id).or_default().push(project_id);
    }

    Ok(works
        .into_iter()
        .map(|work| Publication {
            authors: authors_by_work.remove(&work.id).unwrap_or_default(),
            project_ids: projects_by_work.remove(&work.id).unwrap_or_default(),
            work,
        })
        .collect())
}
