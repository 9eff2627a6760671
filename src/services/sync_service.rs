//! Pulls a researcher's ORCID record into the local tables.
//!
//! All ORCID requests finish before the transaction opens. Reconciliation is
//! planned in memory first (`plan`) so the SQL phase never trips the
//! per-owner unique title/name indexes halfway through.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{ProjectInput, PublicationInput};
use crate::database::DatabaseManager;
use crate::orcid::mapping::{
    profile_from_record, project_from_funding_detail, publication_from_work_detail,
};
use crate::orcid::{OrcidClient, OrcidId};

use super::error::ServiceError;
use super::project_service::{insert_project, set_owner_role, update_project};
use super::publication_service::{insert_work, replace_authors, update_work};
use super::researcher_service::{replace_areas, replace_links};
use super::validation::{dedup_key, normalize_project, normalize_publication, repair_researcher, Mode};

/// Parallel detail requests per sync.
const DETAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub orcid_id: String,
    pub works_inserted: usize,
    pub works_updated: usize,
    pub works_removed: usize,
    pub projects_inserted: usize,
    pub projects_updated: usize,
    pub projects_removed: usize,
    pub warnings: Vec<String>,
}

/// An upstream entry plus whether its detail record was fetched.
#[derive(Debug, Clone)]
struct Fetched<T> {
    input: T,
    detailed: bool,
}

/// A local row as seen by the planner.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Local {
    pub id: Uuid,
    pub put_code: Option<i64>,
    pub key: String,
}

/// An upstream entry as seen by the planner.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Incoming {
    pub put_code: Option<i64>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    /// Row already mirrors this put-code.
    Update { index: usize, id: Uuid },
    /// Local-only row with the same title takes over the put-code.
    Adopt { index: usize, id: Uuid },
    Insert { index: usize, id: Uuid },
    Skip { index: usize, clash: Uuid },
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Plan {
    pub remove: Vec<Uuid>,
    pub actions: Vec<Action>,
}

/// Decides what happens to every local row and upstream entry.
///
/// Rows whose put-code vanished upstream are removed; rows without a put-code
/// are only ever adopted, never removed. `incoming` keys must be unique.
pub(crate) fn plan(existing: &[Local], incoming: &[Incoming]) -> Plan {
    let upstream_codes: HashSet<i64> = incoming.iter().filter_map(|i| i.put_code).collect();

    let mut out = Plan::default();
    let mut keys: HashMap<String, Uuid> = HashMap::new();
    let mut key_of: HashMap<Uuid, String> = HashMap::new();
    let mut by_code: HashMap<i64, Uuid> = HashMap::new();
    let mut local_only: HashSet<Uuid> = HashSet::new();

    for row in existing {
        match row.put_code {
            Some(code) if !upstream_codes.contains(&code) => {
                out.remove.push(row.id);
                continue;
            }
            Some(code) => {
                by_code.insert(code, row.id);
            }
            None => {
                local_only.insert(row.id);
            }
        }
        keys.insert(row.key.clone(), row.id);
        key_of.insert(row.id, row.key.clone());
    }

    let mut pending = Vec::new();
    for (index, item) in incoming.iter().enumerate() {
        let Some(id) = item.put_code.and_then(|code| by_code.get(&code).copied()) else {
            pending.push(index);
            continue;
        };
        match keys.get(&item.key).copied() {
            Some(clash) if clash != id => out.actions.push(Action::Skip { index, clash }),
            _ => {
                if let Some(old) = key_of.insert(id, item.key.clone()) {
                    keys.remove(&old);
                }
                keys.insert(item.key.clone(), id);
                out.actions.push(Action::Update { index, id });
            }
        }
    }

    for index in pending {
        let item = &incoming[index];
        match keys.get(&item.key).copied() {
            Some(id) if local_only.remove(&id) => out.actions.push(Action::Adopt { index, id }),
            Some(clash) => out.actions.push(Action::Skip { index, clash }),
            None => {
                let id = Uuid::new_v4();
                keys.insert(item.key.clone(), id);
                out.actions.push(Action::Insert { index, id });
            }
        }
    }

    out
}

/// Drops entries whose key repeats an earlier one.
fn dedup_incoming<T>(items: Vec<Fetched<T>>, key: impl Fn(&T) -> String, what: &str, warnings: &mut Vec<String>) -> Vec<Fetched<T>> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let k = key(&item.input);
            if seen.insert(k.clone()) {
                true
            } else {
                warnings.push(format!("Skipped duplicate ORCID {} '{}'", what, k));
                false
            }
        })
        .collect()
}

pub struct SyncService {
    pool: PgPool,
    client: &'static OrcidClient,
}

impl SyncService {
    pub fn new(pool: PgPool, client: &'static OrcidClient) -> Self {
        Self { pool, client }
    }

    pub async fn connect() -> Result<Self, ServiceError> {
        Ok(Self::new(DatabaseManager::pool().await?, OrcidClient::shared()?))
    }

    pub async fn sync(&self, orcid_id: &OrcidId) -> Result<SyncReport, ServiceError> {
        let record = self.client.record(orcid_id).await?;
        let profile = profile_from_record(orcid_id, &record);
        let mut report = SyncReport {
            orcid_id: orcid_id.to_string(),
            ..Default::default()
        };

        let researcher = repair_researcher(profile.researcher);
        let works = self.fetch_works(orcid_id, profile.publications, &mut report.warnings).await;
        let fundings = self.fetch_fundings(orcid_id, profile.projects, &mut report.warnings).await;

        let works = dedup_incoming(works, |w| dedup_key(&w.title), "work", &mut report.warnings);
        let fundings = dedup_incoming(fundings, |p| dedup_key(&p.name), "funding", &mut report.warnings);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO users (orcid_id, given_names, family_name, credit_name, institution, biography, email,
                                 registered_at, last_synced_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
               ON CONFLICT (orcid_id) DO UPDATE SET
                   given_names = EXCLUDED.given_names,
                   family_name = EXCLUDED.family_name,
                   credit_name = EXCLUDED.credit_name,
                   institution = EXCLUDED.institution,
                   biography = EXCLUDED.biography,
                   email = EXCLUDED.email,
                   registered_at = COALESCE(users.registered_at, now()),
                   last_synced_at = now(),
                   updated_at = now()"#,
        )
        .bind(orcid_id.as_str())
        .bind(&researcher.given_names)
        .bind(&researcher.family_name)
        .bind(&researcher.credit_name)
        .bind(&researcher.institution)
        .bind(&researcher.biography)
        .bind(&researcher.email)
        .execute(&mut *tx)
        .await?;
        replace_areas(&mut tx, orcid_id.as_str(), researcher.research_areas.as_deref().unwrap_or_default()).await?;
        replace_links(&mut tx, orcid_id.as_str(), researcher.external_links.as_deref().unwrap_or_default()).await?;

        sync_works(&mut tx, orcid_id.as_str(), &works, &mut report).await?;
        sync_projects(&mut tx, orcid_id.as_str(), &fundings, &mut report).await?;

        tx.commit().await?;

        info!(
            "Synced {}: works +{} ~{} -{}, projects +{} ~{} -{}, {} warnings",
            orcid_id,
            report.works_inserted,
            report.works_updated,
            report.works_removed,
            report.projects_inserted,
            report.projects_updated,
            report.projects_removed,
            report.warnings.len()
        );
        Ok(report)
    }

    async fn fetch_works(
        &self,
        orcid_id: &OrcidId,
        summaries: Vec<PublicationInput>,
        warnings: &mut Vec<String>,
    ) -> Vec<Fetched<PublicationInput>> {
        let client = self.client;
        let fetched: Vec<(Fetched<PublicationInput>, Option<String>)> = stream::iter(summaries)
            .map(|summary| async move {
                let Some(put_code) = summary.put_code else {
                    return (Fetched { input: summary, detailed: false }, None);
                };
                match client.work(orcid_id, put_code).await {
                    Ok(work) => match publication_from_work_detail(&work) {
                        Some(detail) => (Fetched { input: detail, detailed: true }, None),
                        None => (
                            Fetched { input: summary, detailed: false },
                            Some(format!("Work {} detail has no title; kept summary", put_code)),
                        ),
                    },
                    Err(e) => (
                        Fetched { input: summary, detailed: false },
                        Some(format!("Work {} detail unavailable ({}); kept summary", put_code, e)),
                    ),
                }
            })
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        let mut out = Vec::with_capacity(fetched.len());
        for (item, warning) in fetched {
            if let Some(warning) = warning {
                warn!("{}", warning);
                warnings.push(warning);
            }
            let put_code = item.input.put_code;
            match normalize_publication(item.input, Mode::Upstream) {
                Ok(input) => out.push(Fetched { input, detailed: item.detailed }),
                Err(e) => warnings.push(format!("Skipped work {:?}: {}", put_code, e)),
            }
        }
        out
    }

    async fn fetch_fundings(
        &self,
        orcid_id: &OrcidId,
        summaries: Vec<ProjectInput>,
        warnings: &mut Vec<String>,
    ) -> Vec<Fetched<ProjectInput>> {
        let client = self.client;
        let fetched: Vec<(Fetched<ProjectInput>, Option<String>)> = stream::iter(summaries)
            .map(|summary| async move {
                let Some(put_code) = summary.put_code else {
                    return (Fetched { input: summary, detailed: false }, None);
                };
                match client.funding(orcid_id, put_code).await {
                    Ok(funding) => match project_from_funding_detail(&funding, orcid_id) {
                        Some(detail) => (Fetched { input: detail, detailed: true }, None),
                        None => (
                            Fetched { input: summary, detailed: false },
                            Some(format!("Funding {} detail has no title; kept summary", put_code)),
                        ),
                    },
                    Err(e) => (
                        Fetched { input: summary, detailed: false },
                        Some(format!("Funding {} detail unavailable ({}); kept summary", put_code, e)),
                    ),
                }
            })
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        let mut out = Vec::with_capacity(fetched.len());
        for (item, warning) in fetched {
            if let Some(warning) = warning {
                warn!("{}", warning);
                warnings.push(warning);
            }
            let put_code = item.input.put_code;
            match normalize_project(item.input, Mode::Upstream) {
                Ok(input) => out.push(Fetched { input, detailed: item.detailed }),
                Err(e) => warnings.push(format!("Skipped funding {:?}: {}", put_code, e)),
            }
        }
        out
    }
}

async fn load_locals(conn: &mut PgConnection, table: &str, label: &str, owner: &str) -> Result<Vec<Local>, ServiceError> {
    let sql = format!("SELECT id, put_code, {label} FROM {table} WHERE owner_orcid = $1");
    let rows: Vec<(Uuid, Option<i64>, String)> = sqlx::query_as(&sql).bind(owner).fetch_all(&mut *conn).await?;
    Ok(rows
        .into_iter()
        .map(|(id, put_code, label)| Local {
            id,
            put_code,
            key: dedup_key(&label),
        })
        .collect())
}

async fn delete_rows(conn: &mut PgConnection, table: &str, ids: &[Uuid]) -> Result<usize, ServiceError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!("DELETE FROM {table} WHERE id = ANY($1)");
    let result = sqlx::query(&sql).bind(ids).execute(&mut *conn).await?;
    Ok(result.rows_affected() as usize)
}

async fn sync_works(
    conn: &mut PgConnection,
    owner: &str,
    works: &[Fetched<PublicationInput>],
    report: &mut SyncReport,
) -> Result<(), ServiceError> {
    let existing = load_locals(conn, "works", "title", owner).await?;
    let incoming: Vec<Incoming> = works
        .iter()
        .map(|w| Incoming {
            put_code: w.input.put_code,
            key: dedup_key(&w.input.title),
        })
        .collect();
    let plan = plan(&existing, &incoming);

    report.works_removed = delete_rows(conn, "works", &plan.remove).await?;
    for action in plan.actions {
        match action {
            Action::Update { index, id } | Action::Adopt { index, id } => {
                let work = &works[index];
                update_work(conn, id, &work.input).await?;
                if work.detailed {
                    replace_authors(conn, id, &work.input).await?;
                }
                report.works_updated += 1;
            }
            Action::Insert { index, id } => {
                let work = &works[index];
                insert_work(conn, id, owner, &work.input).await?;
                replace_authors(conn, id, &work.input).await?;
                report.works_inserted += 1;
            }
            Action::Skip { index, clash } => {
                report.warnings.push(format!(
                    "Work '{}' clashes with local publication {}; not imported",
                    works[index].input.title, clash
                ));
            }
        }
    }
    Ok(())
}

async fn sync_projects(
    conn: &mut PgConnection,
    owner: &str,
    fundings: &[Fetched<ProjectInput>],
    report: &mut SyncReport,
) -> Result<(), ServiceError> {
    let existing = load_locals(conn, "projects", "name", owner).await?;
    let incoming: Vec<Incoming> = fundings
        .iter()
        .map(|f| Incoming {
            put_code: f.input.put_code,
            key: dedup_key(&f.input.name),
        })
        .collect();
    let plan = plan(&existing, &incoming);

    report.projects_removed = delete_rows(conn, "projects", &plan.remove).await?;
    for action in plan.actions {
        match action {
            Action::Update { index, id } | Action::Adopt { index, id } => {
                let project = &fundings[index].input;
                update_project(conn, id, project).await?;
                set_owner_role(conn, id, owner, project.role.as_deref()).await?;
                report.projects_updated += 1;
            }
            Action::Insert { index, id } => {
                let project = &fundings[index].input;
                insert_project(conn, id, owner, project).await?;
                set_owner_role(conn, id, owner, project.role.as_deref()).await?;
                report.projects_inserted += 1;
            }
            Action::Skip { index, clash } => {
                report.warnings.push(format!(
                    "Funding '{}' clashes with local project {}; not imported",
                    fundings[index].input.name, clash
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(put_code: Option<i64>, key: &str) -> Local {
        Local {
            id: Uuid::new_v4(),
            put_code,
            key: key.to_string(),
        }
    }

    fn incoming(put_code: Option<i64>, key: &str) -> Incoming {
        Incoming {
            put_code,
            key: key.to_string(),
        }
    }

    #[test]
    fn matches_by_put_code_first() {
        let row = local(Some(10), "old title");
        let out = plan(&[row.clone()], &[incoming(Some(10), "new title")]);
        assert!(out.remove.is_empty());
        assert_eq!(out.actions, vec![Action::Update { index: 0, id: row.id }]);
    }

    #[test]
    fn adopts_local_only_work_with_same_title() {
        let row = local(None, "cracked pots");
        let out = plan(&[row.clone()], &[incoming(Some(7), "cracked pots")]);
        assert_eq!(out.actions, vec![Action::Adopt { index: 0, id: row.id }]);
    }

    #[test]
    fn inserts_unknown_entries() {
        let out = plan(&[], &[incoming(Some(1), "a"), incoming(Some(2), "b")]);
        assert_eq!(out.actions.len(), 2);
        assert!(out.actions.iter().all(|a| matches!(a, Action::Insert { .. })));
    }

    #[test]
    fn removes_vanished_put_codes_but_keeps_local_only_rows() {
        let gone = local(Some(99), "retracted");
        let mine = local(None, "my notes");
        let out = plan(&[gone.clone(), mine], &[]);
        assert_eq!(out.remove, vec![gone.id]);
        assert!(out.actions.is_empty());
    }

    #[test]
    fn freed_title_can_be_reused_after_removal() {
        let gone = local(Some(1), "shared");
        let out = plan(&[gone.clone()], &[incoming(Some(2), "shared")]);
        assert_eq!(out.remove, vec![gone.id]);
        assert!(matches!(out.actions[0], Action::Insert { index: 0, .. }));
    }

    #[test]
    fn rename_onto_existing_title_is_skipped() {
        let synced = local(Some(5), "first");
        let mine = local(None, "second");
        let out = plan(&[synced, mine.clone()], &[incoming(Some(5), "second")]);
        assert_eq!(out.actions, vec![Action::Skip { index: 0, clash: mine.id }]);
    }

    #[test]
    fn rename_frees_the_old_title() {
        let synced = local(Some(5), "first");
        let out = plan(
            &[synced.clone()],
            &[incoming(Some(5), "renamed"), incoming(Some(6), "first")],
        );
        assert_eq!(out.actions[0], Action::Update { index: 0, id: synced.id });
        assert!(matches!(out.actions[1], Action::Insert { index: 1, .. }));
    }

    #[test]
    fn local_only_row_is_adopted_once() {
        let mine = local(None, "paper");
        let out = plan(&[mine.clone()], &[incoming(Some(1), "paper")]);
        assert_eq!(out.actions, vec![Action::Adopt { index: 0, id: mine.id }]);
    }

    #[test]
    fn duplicate_upstream_titles_are_dropped_with_warning() {
        let items = vec![
            Fetched { input: "Same".to_string(), detailed: true },
            Fetched { input: " same ".to_string(), detailed: true },
            Fetched { input: "Other".to_string(), detailed: false },
        ];
        let mut warnings = Vec::new();
        let kept = dedup_incoming(items, |t| dedup_key(t), "work", &mut warnings);
        assert_eq!(kept.len(), 2);
        assert_eq!(warnings.len(), 1);
    }
}
