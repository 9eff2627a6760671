//! Input normalization and validation shared by the API and ORCID sync paths.
//!
//! `Mode::Api` rejects bad input with per-field errors. `Mode::Upstream` is
//! used for ORCID data: it repairs or drops what it can instead of failing.

use chrono::{Datelike, Utc};
use std::collections::HashMap;

use crate::database::models::{AuthorInput, ExternalLink, ProjectInput, PublicationInput, ResearcherInput};
use crate::orcid::mapping::{dedup_areas, normalize_type};
use crate::orcid::OrcidId;

use super::error::ServiceError;

pub const MAX_TITLE_LEN: usize = 1000;
pub const MAX_TEXT_LEN: usize = 10_000;

/// ORCID v3.0 work types.
pub const WORK_TYPES: &[&str] = &[
    "annotation", "artistic-performance", "book", "book-chapter", "book-review",
    "conference-abstract", "conference-paper", "conference-poster", "data-management-plan",
    "data-set", "dictionary-entry", "disclosure", "dissertation", "dissertation-thesis",
    "edited-book", "encyclopedia-entry", "invention", "journal-article", "journal-issue",
    "lecture-speech", "license", "magazine-article", "manual", "newsletter-article",
    "newspaper-article", "online-resource", "other", "patent", "physical-object", "preprint",
    "registered-copyright", "report", "research-technique", "research-tool", "review",
    "software", "spin-off-company", "standards-and-policy", "supervised-student-publication",
    "technical-standard", "test", "trademark", "translation", "website", "working-paper",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Api,
    Upstream,
}

#[derive(Default)]
struct Errors(HashMap<String, String>);

impl Errors {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    fn finish(self) -> Result<(), ServiceError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self.0))
        }
    }
}

pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn is_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

fn max_year() -> i32 {
    Utc::now().year() + 1
}

pub fn normalize_researcher(input: ResearcherInput) -> Result<ResearcherInput, ServiceError> {
    let mut errors = Errors::default();

    let orcid_id = match clean(input.orcid_id) {
        Some(raw) => match OrcidId::parse(&raw) {
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                errors.add("orcid_id", e.to_string());
                None
            }
        },
        None => None,
    };

    let given_names = clean(input.given_names);
    let family_name = clean(input.family_name);
    let credit_name = clean(input.credit_name);
    if given_names.is_none() && family_name.is_none() && credit_name.is_none() {
        errors.add("name", "At least one of given_names, family_name or credit_name is required");
    }

    let biography = clean(input.biography);
    if biography.as_ref().map_or(false, |b| b.len() > MAX_TEXT_LEN) {
        errors.add("biography", format!("Biography must be at most {} characters", MAX_TEXT_LEN));
    }

    let email = clean(input.email);
    if email.as_deref().map_or(false, |e| !is_email(e)) {
        errors.add("email", "Invalid email format");
    }

    let external_links = input.external_links.map(|links| {
        let mut out: Vec<ExternalLink> = Vec::new();
        for link in links {
            let url = link.url.trim().to_string();
            if !is_web_url(&url) {
                errors.add("external_links", format!("'{}' is not an http(s) URL", url));
                continue;
            }
            if out.iter().any(|l| l.url == url) {
                continue;
            }
            let name = match link.name.trim() {
                "" => url.clone(),
                n => n.to_string(),
            };
            out.push(ExternalLink { name, url });
        }
        out
    });

    errors.finish()?;

    Ok(ResearcherInput {
        orcid_id,
        given_names,
        family_name,
        credit_name,
        institution: clean(input.institution),
        biography,
        email,
        research_areas: input.research_areas.map(dedup_areas),
        external_links,
    })
}

/// Lenient variant for ORCID person data: invalid emails and links are dropped
/// and a record without any name is accepted.
pub fn repair_researcher(input: ResearcherInput) -> ResearcherInput {
    let external_links = input.external_links.map(|links| {
        let mut out: Vec<ExternalLink> = Vec::new();
        for link in links {
            let url = link.url.trim().to_string();
            if !is_web_url(&url) || out.iter().any(|l| l.url == url) {
                continue;
            }
            let name = match link.name.trim() {
                "" => url.clone(),
                n => n.to_string(),
            };
            out.push(ExternalLink { name, url });
        }
        out
    });

    ResearcherInput {
        orcid_id: input.orcid_id,
        given_names: clean(input.given_names),
        family_name: clean(input.family_name),
        credit_name: clean(input.credit_name),
        institution: clean(input.institution),
        biography: clean(input.biography),
        email: clean(input.email).filter(|e| is_email(e)),
        research_areas: input.research_areas.map(dedup_areas),
        external_links,
    }
}

pub fn normalize_publication(input: PublicationInput, mode: Mode) -> Result<PublicationInput, ServiceError> {
    let mut errors = Errors::default();

    let title = input.title.trim().to_string();
    if title.is_empty() {
        errors.add("title", "Title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.add("title", format!("Title must be at most {} characters", MAX_TITLE_LEN));
    }

    let publication_year = match input.publication_year {
        Some(y) if !(1000..=max_year()).contains(&y) => {
            if mode == Mode::Api {
                errors.add("publication_year", format!("Year must be between 1000 and {}", max_year()));
            }
            None
        }
        other => other,
    };

    let work_type = match clean(input.work_type).map(|t| normalize_type(&t)) {
        None => "other".to_string(),
        Some(t) if WORK_TYPES.contains(&t.as_str()) => t,
        Some(t) => {
            if mode == Mode::Api {
                errors.add("work_type", format!("Unknown work type '{}'", t));
            }
            "other".to_string()
        }
    };

    let url = clean(input.url);
    if let Some(u) = &url {
        if mode == Mode::Api && !is_web_url(u) {
            errors.add("url", "URL must be an http(s) address");
        }
    }
    let url = url.filter(|u| is_web_url(u));

    let mut authors = Vec::with_capacity(input.authors.len());
    for (i, author) in input.authors.into_iter().enumerate() {
        let name = author.name.trim().to_string();
        if name.is_empty() {
            if mode == Mode::Api {
                errors.add(&format!("authors[{}].name", i), "Author name is required");
            }
            continue;
        }
        let orcid_id = match clean(author.orcid_id) {
            Some(raw) => match OrcidId::parse(&raw) {
                Ok(id) => Some(id.to_string()),
                Err(e) => {
                    if mode == Mode::Api {
                        errors.add(&format!("authors[{}].orcid_id", i), e.to_string());
                    }
                    None
                }
            },
            None => None,
        };
        authors.push(AuthorInput { name, orcid_id });
    }

    let description = clean(input.description);
    if description.as_ref().map_or(false, |d| d.len() > MAX_TEXT_LEN) {
        errors.add("description", format!("Description must be at most {} characters", MAX_TEXT_LEN));
    }

    errors.finish()?;

    Ok(PublicationInput {
        put_code: input.put_code,
        title,
        publication_year,
        work_type: Some(work_type),
        source: clean(input.source),
        identifier_type: clean(input.identifier_type).map(|t| t.to_ascii_lowercase()),
        identifier_value: clean(input.identifier_value),
        url,
        journal_title: clean(input.journal_title),
        description,
        authors,
        project_ids: input.project_ids,
    })
}

pub fn normalize_project(input: ProjectInput, mode: Mode) -> Result<ProjectInput, ServiceError> {
    let mut errors = Errors::default();

    let name = input.name.trim().to_string();
    if name.is_empty() {
        errors.add("name", "Project name is required");
    } else if name.chars().count() > MAX_TITLE_LEN {
        errors.add("name", format!("Project name must be at most {} characters", MAX_TITLE_LEN));
    }

    let mut month = |field: &str, value: Option<i32>| match value {
        Some(m) if !(1..=12).contains(&m) => {
            if mode == Mode::Api {
                errors.add(field, "Month must be between 1 and 12");
            }
            None
        }
        other => other,
    };
    let start_month = month("start_month", input.start_month);
    let end_month = month("end_month", input.end_month);

    let start = input.start_year.map(|y| (y, start_month.unwrap_or(1)));
    let end = input.end_year.map(|y| (y, end_month.unwrap_or(12)));
    let (mut end_year, mut end_month) = (input.end_year, end_month);
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            if mode == Mode::Api {
                errors.add("end_year", "Project cannot end before it starts");
            } else {
                end_year = None;
                end_month = None;
            }
        }
    }

    let mut funding_amount = input.funding_amount;
    if funding_amount.map_or(false, |a| a.is_sign_negative()) {
        if mode == Mode::Api {
            errors.add("funding_amount", "Funding amount cannot be negative");
        }
        funding_amount = None;
    }

    let currency = clean(input.currency).map(|c| c.to_ascii_uppercase());
    let currency_ok = currency
        .as_deref()
        .map_or(true, |c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_uppercase()));
    if !currency_ok && mode == Mode::Api {
        errors.add("currency", "Currency must be a three-letter ISO 4217 code");
    }
    let currency = currency.filter(|_| currency_ok);
    if funding_amount.is_some() && currency.is_none() {
        if mode == Mode::Api {
            errors.add("currency", "Currency is required when an amount is given");
        }
        funding_amount = None;
    }

    let url = clean(input.url);
    if let Some(u) = &url {
        if mode == Mode::Api && !is_web_url(u) {
            errors.add("url", "URL must be an http(s) address");
        }
    }
    let url = url.filter(|u| is_web_url(u));

    errors.finish()?;

    Ok(ProjectInput {
        put_code: input.put_code,
        name,
        start_year: input.start_year,
        start_month,
        end_year,
        end_month: end_year.and(end_month),
        funding_agency: clean(input.funding_agency),
        funding_amount,
        currency: funding_amount.and(currency),
        role: clean(input.role).map(|r| normalize_type(&r)),
        description: clean(input.description),
        url,
    })
}

/// Case- and whitespace-insensitive key used for title/name de-duplication.
pub fn dedup_key(value: &str) -> String {
    value.trim().to_lowercase()
}
