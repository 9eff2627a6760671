use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{MemberInput, Project, ProjectInput, ProjectMember, ProjectView, Publication, Work};
use crate::database::DatabaseManager;
use crate::filter::{contains_pattern, FilterOrder, FilterOrderInfo, ListQuery, Page, SortDirection, SortSpec};
use crate::orcid::mapping::normalize_type;
use crate::orcid::OrcidId;

use super::error::ServiceError;
use super::publication_service;
use super::researcher_service::ensure_researcher_exists;
use super::validation::{clean, normalize_project, Mode};

pub const PROJECT_SORT: SortSpec = SortSpec {
    fields: &[
        ("name", "p.name"),
        ("start_year", "p.start_year"),
        ("funding_agency", "p.funding_agency"),
        ("created_at", "p.created_at"),
    ],
    default: &[
        FilterOrderInfo { column: "p.start_year", sort: SortDirection::Desc },
        FilterOrderInfo { column: "p.name", sort: SortDirection::Asc },
    ],
};

pub struct ProjectService {
    pool: PgPool,
}

impl ProjectService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect() -> Result<Self, ServiceError> {
        Ok(Self::new(DatabaseManager::pool().await?))
    }

    /// Projects the researcher owns or is a member of.
    pub async fn list_for(&self, orcid_id: &OrcidId, query: &ListQuery) -> Result<Page<ProjectView>, ServiceError> {
        let pagination = query.pagination();
        let order = FilterOrder::parse(query.sort.as_deref(), &PROJECT_SORT)?;

        let mut conn = self.pool.acquire().await?;
        ensure_researcher_exists(&mut conn, orcid_id.as_str()).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
        push_filters(&mut count, orcid_id, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT p.* FROM projects p");
        push_filters(&mut select, orcid_id, query);
        select.push(" ");
        select.push(FilterOrder::generate(&order));
        select.push(", p.id LIMIT ");
        select.push_bind(pagination.limit());
        select.push(" OFFSET ");
        select.push_bind(pagination.offset());
        let projects: Vec<Project> = select.build_query_as().fetch_all(&mut *conn).await?;

        let items = hydrate(&mut conn, projects).await?;
        Ok(Page::new(items, total, &pagination))
    }

    pub async fn get(&self, id: Uuid) -> Result<ProjectView, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        load_project(&mut conn, id).await
    }

    pub async fn owner_of(&self, id: Uuid) -> Result<String, ServiceError> {
        sqlx::query_scalar::<_, String>("SELECT owner_orcid FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Creates a project; the owner becomes its first member with the project role.
    pub async fn create(&self, owner: &OrcidId, input: ProjectInput) -> Result<ProjectView, ServiceError> {
        let input = normalize_project(input, Mode::Api)?;

        let mut tx = self.pool.begin().await?;
        ensure_researcher_exists(&mut tx, owner.as_str()).await?;
        ensure_unique_name(&mut tx, owner.as_str(), &input.name, None).await?;

        let id = Uuid::new_v4();
        insert_project(&mut tx, id, owner.as_str(), &input).await?;
        set_owner_role(&mut tx, id, owner.as_str(), input.role.as_deref()).await?;

        let project = load_project(&mut tx, id).await?;
        tx.commit().await?;

        info!("Created project {} for {}", id, owner);
        Ok(project)
    }

    pub async fn update(&self, id: Uuid, input: ProjectInput) -> Result<ProjectView, ServiceError> {
        let input = normalize_project(input, Mode::Api)?;

        let mut tx = self.pool.begin().await?;
        let owner = lock_owner(&mut tx, id).await?;
        ensure_unique_name(&mut tx, &owner, &input.name, Some(id)).await?;
        update_project(&mut tx, id, &input).await?;
        set_owner_role(&mut tx, id, &owner, input.role.as_deref()).await?;

        let project = load_project(&mut tx, id).await?;
        tx.commit().await?;
        Ok(project)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        info!("Deleted project {}", id);
        Ok(())
    }

    /// Adds a registered researcher to the project, or updates their role.
    pub async fn add_member(&self, id: Uuid, input: MemberInput) -> Result<ProjectView, ServiceError> {
        let member = OrcidId::parse(&input.orcid_id)?;
        let role = clean(input.role).map(|r| normalize_type(&r));

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, id).await?;
        ensure_researcher_exists(&mut tx, member.as_str()).await?;
        upsert_member(&mut tx, id, member.as_str(), role.as_deref()).await?;

        let project = load_project(&mut tx, id).await?;
        tx.commit().await?;
        Ok(project)
    }

    pub async fn remove_member(&self, id: Uuid, member: &OrcidId) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let owner = lock_owner(&mut tx, id).await?;
        if owner == member.as_str() {
            return Err(ServiceError::BadRequest(
                "The project owner cannot be removed; delete the project instead".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM user_projects WHERE project_id = $1 AND orcid_id = $2")
            .bind(id)
            .bind(member.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("{} is not a member of project {}", member, id)));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Links a publication to the project. Both must belong to the same researcher.
    pub async fn link_work(&self, id: Uuid, work_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let owner = lock_owner(&mut tx, id).await?;
        let work_owner: String = sqlx::query_scalar("SELECT owner_orcid FROM works WHERE id = $1")
            .bind(work_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Publication {} not found", work_id)))?;
        if work_owner != owner {
            return Err(ServiceError::BadRequest(
                "Publications can only be linked to projects of the same researcher".to_string(),
            ));
        }

        sqlx::query("INSERT INTO work_projects (work_id, project_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(work_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes a publication link. Unlinking something that is not linked is a no-op.
    pub async fn unlink_work(&self, id: Uuid, work_id: Uuid) -> Result<(), ServiceError> {
        let mut conn = self.pool.acquire().await?;
        ensure_project_exists(&mut conn, id).await?;
        sqlx::query("DELETE FROM work_projects WHERE work_id = $1 AND project_id = $2")
            .bind(work_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn publications(&self, id: Uuid) -> Result<Vec<Publication>, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        ensure_project_exists(&mut conn, id).await?;
        let works: Vec<Work> = sqlx::query_as(
            r#"SELECT w.* FROM works w
               JOIN work_projects wp ON wp.work_id = w.id
               WHERE wp.project_id = $1
               ORDER BY w.publication_year DESC NULLS LAST, w.title"#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        publication_service::hydrate(&mut conn, works).await
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Project {} not found", id))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, orcid_id: &OrcidId, query: &ListQuery) {
    builder.push(" WHERE (p.owner_orcid = ");
    builder.push_bind(orcid_id.to_string());
    builder.push(" OR EXISTS (SELECT 1 FROM user_projects up WHERE up.project_id = p.id AND up.orcid_id = ");
    builder.push_bind(orcid_id.to_string());
    builder.push("))");
    if let Some(term) = query.term() {
        let pattern = contains_pattern(term);
        builder.push(" AND (");
        let mut separated = builder.separated(" OR ");
        for column in ["p.name", "p.description", "p.funding_agency"] {
            separated.push(format!("{} ILIKE ", column));
            separated.push_bind_unseparated(pattern.clone());
        }
        builder.push(")");
    }
    if let Some(year) = query.year {
        builder.push(" AND p.start_year <= ");
        builder.push_bind(year);
        builder.push(" AND (p.end_year IS NULL OR p.end_year >= ");
        builder.push_bind(year);
        builder.push(")");
    }
}

async fn ensure_project_exists(conn: &mut PgConnection, id: Uuid) -> Result<(), ServiceError> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    if found {
        Ok(())
    } else {
        Err(not_found(id))
    }
}

/// Locks the project row and returns its owner.
async fn lock_owner(conn: &mut PgConnection, id: Uuid) -> Result<String, ServiceError> {
    sqlx::query_scalar::<_, String>("SELECT owner_orcid FROM projects WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(id))
}

pub(crate) async fn ensure_unique_name(
    conn: &mut PgConnection,
    owner: &str,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let clash: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM projects WHERE owner_orcid = $1 AND lower(btrim(name)) = lower(btrim($2)) AND ($3::uuid IS NULL OR id <> $3)",
    )
    .bind(owner)
    .bind(name)
    .bind(except)
    .fetch_optional(&mut *conn)
    .await?;

    match clash {
        Some(_) => Err(ServiceError::Conflict(format!("A project named '{}' already exists", name))),
        None => Ok(()),
    }
}

pub(crate) async fn insert_project(
    conn: &mut PgConnection,
    id: Uuid,
    owner: &str,
    input: &ProjectInput,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"INSERT INTO projects (id, owner_orcid, put_code, name, start_year, start_month, end_year, end_month,
                                 funding_agency, funding_amount, currency, role, description, url)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
    )
    .bind(id)
    .bind(owner)
    .bind(input.put_code)
    .bind(&input.name)
    .bind(input.start_year)
    .bind(input.start_month)
    .bind(input.end_year)
    .bind(input.end_month)
    .bind(&input.funding_agency)
    .bind(input.funding_amount)
    .bind(&input.currency)
    .bind(&input.role)
    .bind(&input.description)
    .bind(&input.url)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_project(conn: &mut PgConnection, id: Uuid, input: &ProjectInput) -> Result<(), ServiceError> {
    sqlx::query(
        r#"UPDATE projects SET
               put_code = COALESCE($2, put_code),
               name = $3,
               start_year = $4,
               start_month = $5,
               end_year = $6,
               end_month = $7,
               funding_agency = $8,
               funding_amount = $9,
               currency = $10,
               role = $11,
               description = $12,
               url = $13,
               updated_at = now()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(input.put_code)
    .bind(&input.name)
    .bind(input.start_year)
    .bind(input.start_month)
    .bind(input.end_year)
    .bind(input.end_month)
    .bind(&input.funding_agency)
    .bind(input.funding_amount)
    .bind(&input.currency)
    .bind(&input.role)
    .bind(&input.description)
    .bind(&input.url)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_member(
    conn: &mut PgConnection,
    project_id: Uuid,
    orcid_id: &str,
    role: Option<&str>,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"INSERT INTO user_projects (orcid_id, project_id, role) VALUES ($1, $2, $3)
           ON CONFLICT (orcid_id, project_id) DO UPDATE SET role = COALESCE(EXCLUDED.role, user_projects.role)"#,
    )
    .bind(orcid_id)
    .bind(project_id)
    .bind(role)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The owner's membership always mirrors the project role, including clearing it.
pub(crate) async fn set_owner_role(
    conn: &mut PgConnection,
    project_id: Uuid,
    owner: &str,
    role: Option<&str>,
) -> Result<(), ServiceError> {
    sqlx::query(OWNER_ROLE_SQL)
        .bind(owner)
        .bind(project_id)
        .bind(role)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

const OWNER_ROLE_SQL: &str = r#"INSERT INTO user_projects (orcid_id, project_id, role) VALUES ($1, $2, $3)
   ON CONFLICT (orcid_id, project_id) DO UPDATE SET role = EXCLUDED.role"#;

async fn load_project(conn: &mut PgConnection, id: Uuid) -> Result<ProjectView, ServiceError> {
    let project: Project = sqlx::query_as("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(id))?;

    hydrate(conn, vec![project])
        .await?
        .pop()
        .ok_or_else(|| not_found(id))
}

async fn hydrate(conn: &mut PgConnection, projects: Vec<Project>) -> Result<Vec<ProjectView>, ServiceError> {
    if projects.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();

    let members: Vec<ProjectMember> = sqlx::query_as(
        r#"SELECT up.project_id, up.orcid_id, up.role,
                  COALESCE(NULLIF(btrim(u.credit_name), ''),
                           NULLIF(btrim(concat_ws(' ', u.given_names, u.family_name)), ''),
                           u.orcid_id) AS name
           FROM user_projects up
           JOIN users u ON u.orcid_id = up.orcid_id
           WHERE up.project_id = ANY($1)
           ORDER BY up.project_id, u.family_name NULLS LAST, u.orcid_id"#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let links: Vec<(Uuid, Uuid)> =
        sqlx::query_as("SELECT project_id, work_id FROM work_projects WHERE project_id = ANY($1) ORDER BY work_id")
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await?;

    let mut members_by_project: HashMap<Uuid, Vec<ProjectMember>> = HashMap::new();
    for member in members {
        members_by_project.entry(member.project_id).or_default().push(member);
    }
    let mut works_by_project: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (project_id, work_id) in links {
        works_by_project.entry(project_id).or_default().push(work_id);
    }

    Ok(projects
        .into_iter()
        .map(|project| ProjectView {
            members: members_by_project.remove(&project.id).unwrap_or_default(),
            work_ids: works_by_project.remove(&project.id).unwrap_or_default(),
            project,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_owned_and_member_projects() {
        let id = OrcidId::parse("0000-0002-1825-0097").unwrap();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT p.* FROM projects p");
        push_filters(&mut builder, &id, &ListQuery::default());
        assert_eq!(
            builder.sql(),
            "SELECT p.* FROM projects p WHERE (p.owner_orcid = $1 OR EXISTS (SELECT 1 FROM user_projects up \
             WHERE up.project_id = p.id AND up.orcid_id = $2))"
        );
    }

    #[test]
    fn year_filter_matches_running_projects() {
        let id = OrcidId::parse("0000-0002-1825-0097").unwrap();
        let query = ListQuery {
            year: Some(2020),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
        push_filters(&mut builder, &id, &query);
        assert!(builder
            .sql()
            .ends_with("AND p.start_year <= $3 AND (p.end_year IS NULL OR p.end_year >= $4)"));
    }

    #[test]
    fn search_term_covers_name_description_and_agency() {
        let id = OrcidId::parse("0000-0002-1825-0097").unwrap();
        let query = ListQuery {
            q: Some("glaze".into()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
        push_filters(&mut builder, &id, &query);
        assert!(builder
            .sql()
            .ends_with("AND (p.name ILIKE $3 OR p.description ILIKE $4 OR p.funding_agency ILIKE $5)"));
    }

    #[test]
    fn owner_role_is_overwritten_not_coalesced() {
        assert!(OWNER_ROLE_SQL.ends_with("DO UPDATE SET role = EXCLUDED.role"));
        assert!(!OWNER_ROLE_SQL.contains("COALESCE"));
    }

    #[test]
    fn default_order_is_most_recent_first() {
        let order = FilterOrder::parse(None, &PROJECT_SORT).unwrap();
        assert_eq!(
            FilterOrder::generate(&order),
            "ORDER BY p.start_year DESC NULLS LAST, p.name ASC NULLS LAST"
        );
    }
}
