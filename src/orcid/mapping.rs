//! Flattening of ORCID's nested record JSON into the local profile shapes.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;

use crate::database::models::{display_name, AuthorInput, ExternalLink, ProjectInput, PublicationInput, ResearcherInput};

use super::identifier::OrcidId;
use super::types::{
    text, ExpandedSearchResult, Funding, FundingSummary, Fundings, Person, Record, Work, WorkSummary, Works,
};

/// A live ORCID profile mapped to local shapes, as served by the proxy endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct OrcidProfile {
    pub orcid_id: OrcidId,
    pub display_name: String,
    pub researcher: ResearcherInput,
    pub publications: Vec<PublicationInput>,
    pub projects: Vec<ProjectInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub orcid_id: OrcidId,
    pub given_names: Option<String>,
    pub family_names: Option<String>,
    pub credit_name: Option<String>,
    pub display_name: String,
    pub institutions: Vec<String>,
    pub emails: Vec<String>,
}

pub fn profile_from_record(orcid_id: &OrcidId, record: &Record) -> OrcidProfile {
    let researcher = researcher_from_record(orcid_id, record);
    let activities = record.activities_summary.as_ref();
    let publications = activities
        .and_then(|a| a.works.as_ref())
        .map(publications_from_works)
        .unwrap_or_default();
    let projects = activities
        .and_then(|a| a.fundings.as_ref())
        .map(projects_from_fundings)
        .unwrap_or_default();

    OrcidProfile {
        orcid_id: orcid_id.clone(),
        display_name: display_name(
            researcher.credit_name.as_deref(),
            researcher.given_names.as_deref(),
            researcher.family_name.as_deref(),
            orcid_id.as_str(),
        ),
        researcher,
        publications,
        projects,
    }
}

pub fn researcher_from_record(orcid_id: &OrcidId, record: &Record) -> ResearcherInput {
    let mut researcher = record
        .person
        .as_ref()
        .map(researcher_from_person)
        .unwrap_or_default();
    researcher.orcid_id = Some(orcid_id.to_string());
    researcher.institution = current_institution(record);
    researcher
}

pub fn researcher_from_person(person: &Person) -> ResearcherInput {
    let name = person.name.as_ref();
    let keywords = person
        .keywords
        .as_ref()
        .map(|k| k.keyword.iter().filter_map(|kw| kw.content.clone()).collect::<Vec<_>>())
        .unwrap_or_default();

    let links = person
        .researcher_urls
        .as_ref()
        .map(|urls| {
            urls.researcher_url
                .iter()
                .filter_map(|u| {
                    let url = text(&u.url)?.to_string();
                    let name = u
                        .url_name
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| url.clone());
                    Some(ExternalLink { name, url })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let email = person.emails.as_ref().and_then(|e| {
        e.email
            .iter()
            .filter(|em| em.visibility.as_deref().map_or(true, |v| v.eq_ignore_ascii_case("public")))
            .find_map(|em| em.email.clone())
    });

    ResearcherInput {
        orcid_id: None,
        given_names: name.and_then(|n| text(&n.given_names)).map(str::to_string),
        family_name: name.and_then(|n| text(&n.family_name)).map(str::to_string),
        credit_name: name.and_then(|n| text(&n.credit_name)).map(str::to_string),
        institution: None,
        biography: person
            .biography
            .as_ref()
            .and_then(|b| b.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        email,
        research_areas: Some(dedup_areas(keywords)),
        external_links: Some(links),
    }
}

/// Organization of the first open-ended employment, else the first employment listed.
fn current_institution(record: &Record) -> Option<String> {
    let employments: Vec<_> = record
        .activities_summary
        .as_ref()?
        .employments
        .as_ref()?
        .affiliation_group
        .iter()
        .flat_map(|g| g.summaries.iter())
        .filter_map(|s| s.employment_summary.as_ref())
        .collect();

    employments
        .iter()
        .find(|e| e.end_date.as_ref().and_then(|d| d.year()).is_none())
        .or_else(|| employments.first())
        .and_then(|e| e.organization.as_ref())
        .and_then(|o| o.name.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trim, drop empties, drop case-insensitive duplicates (first spelling wins).
pub fn dedup_areas<I, S>(areas: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    areas
        .into_iter()
        .filter_map(|a| {
            let trimmed = a.as_ref().trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_lowercase()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// One publication per ORCID group, taken from the group's preferred (first) summary.
pub fn publications_from_works(works: &Works) -> Vec<PublicationInput> {
    works
        .group
        .iter()
        .filter_map(|g| g.work_summary.first())
        .filter_map(publication_from_summary)
        .collect()
}

pub fn publication_from_summary(summary: &WorkSummary) -> Option<PublicationInput> {
    let title = summary.title.as_ref().and_then(|t| text(&t.title))?.to_string();
    let (identifier_type, identifier_value, identifier_url) = preferred_identifier(summary.external_ids.as_ref());

    Some(PublicationInput {
        put_code: summary.put_code,
        title,
        publication_year: summary.publication_date.as_ref().and_then(|d| d.year()),
        work_type: summary.work_type.as_deref().map(normalize_type),
        source: summary
            .source
            .as_ref()
            .and_then(|s| text(&s.source_name))
            .map(str::to_string),
        identifier_type,
        identifier_value,
        url: text(&summary.url).map(str::to_string).or(identifier_url),
        journal_title: text(&summary.journal_title).map(str::to_string),
        description: None,
        authors: Vec::new(),
        project_ids: None,
    })
}

pub fn publication_from_work_detail(work: &Work) -> Option<PublicationInput> {
    let title = work.title.as_ref().and_then(|t| text(&t.title))?.to_string();
    let (identifier_type, identifier_value, identifier_url) = preferred_identifier(work.external_ids.as_ref());

    let authors = work
        .contributors
        .as_ref()
        .map(|c| {
            c.contributor
                .iter()
                .filter_map(|contributor| {
                    let name = text(&contributor.credit_name)?.to_string();
                    Some(AuthorInput {
                        name,
                        orcid_id: contributor_orcid(contributor.contributor_orcid.as_ref()),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(PublicationInput {
        put_code: work.put_code,
        title,
        publication_year: work.publication_date.as_ref().and_then(|d| d.year()),
        work_type: work.work_type.as_deref().map(normalize_type),
        source: work
            .source
            .as_ref()
            .and_then(|s| text(&s.source_name))
            .map(str::to_string),
        identifier_type,
        identifier_value,
        url: text(&work.url).map(str::to_string).or(identifier_url),
        journal_title: text(&work.journal_title).map(str::to_string),
        description: work
            .short_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        authors,
        project_ids: None,
    })
}

/// First external id, preferring a DOI. Returns (type, value, url).
fn preferred_identifier(
    ids: Option<&super::types::ExternalIds>,
) -> (Option<String>, Option<String>, Option<String>) {
    let Some(ids) = ids else {
        return (None, None, None);
    };
    let usable: Vec<_> = ids
        .external_id
        .iter()
        .filter(|id| id.external_id_value.as_deref().map_or(false, |v| !v.trim().is_empty()))
        .collect();
    let chosen = usable
        .iter()
        .find(|id| id.external_id_type.as_deref().map_or(false, |t| t.eq_ignore_ascii_case("doi")))
        .or_else(|| usable.first());

    match chosen {
        Some(id) => (
            id.external_id_type.as_deref().map(|t| t.to_ascii_lowercase()),
            id.external_id_value.as_deref().map(|v| v.trim().to_string()),
            text(&id.external_id_url).map(str::to_string),
        ),
        None => (None, None, None),
    }
}

fn contributor_orcid(identifier: Option<&super::types::OrcidIdentifier>) -> Option<String> {
    let identifier = identifier?;
    identifier
        .path
        .as_deref()
        .or(identifier.uri.as_deref())
        .and_then(|raw| OrcidId::parse(raw).ok())
        .map(|id| id.to_string())
}

/// ORCID serializes enum values as `journal-article` in JSON but accepts `JOURNAL_ARTICLE` elsewhere.
pub fn normalize_type(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('_', "-")
}

pub fn projects_from_fundings(fundings: &Fundings) -> Vec<ProjectInput> {
    fundings
        .group
        .iter()
        .filter_map(|g| g.funding_summary.first())
        .filter_map(project_from_summary)
        .collect()
}

pub fn project_from_summary(summary: &FundingSummary) -> Option<ProjectInput> {
    let name = summary.title.as_ref().and_then(|t| text(&t.title))?.to_string();
    let start = summary.start_date.as_ref();
    let end = summary.end_date.as_ref();

    Some(ProjectInput {
        put_code: summary.put_code,
        name,
        start_year: start.and_then(|d| d.year()),
        start_month: start.and_then(|d| d.month()),
        end_year: end.and_then(|d| d.year()),
        end_month: end.and_then(|d| d.month()),
        funding_agency: organization_name(summary.organization.as_ref()),
        funding_amount: None,
        currency: None,
        role: None,
        description: None,
        url: text(&summary.url).map(str::to_string),
    })
}

/// `owner` picks the contributor role belonging to the profile being mapped.
pub fn project_from_funding_detail(funding: &Funding, owner: &OrcidId) -> Option<ProjectInput> {
    let name = funding.title.as_ref().and_then(|t| text(&t.title))?.to_string();
    let start = funding.start_date.as_ref();
    let end = funding.end_date.as_ref();

    let (funding_amount, currency) = match funding.amount.as_ref() {
        Some(amount) => {
            let value = amount
                .value
                .as_deref()
                .map(|v| v.replace(',', ""))
                .and_then(|v| Decimal::from_str(v.trim()).ok());
            let currency = value
                .and(amount.currency_code.as_deref())
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty());
            (value, currency)
        }
        None => (None, None),
    };

    let role = funding.contributors.as_ref().and_then(|c| {
        c.contributor
            .iter()
            .find(|contributor| {
                contributor_orcid(contributor.contributor_orcid.as_ref()).as_deref() == Some(owner.as_str())
            })
            .and_then(|contributor| contributor.contributor_attributes.as_ref())
            .and_then(|attrs| attrs.contributor_role.as_deref())
            .map(normalize_type)
    });

    Some(ProjectInput {
        put_code: funding.put_code,
        name,
        start_year: start.and_then(|d| d.year()),
        start_month: start.and_then(|d| d.month()),
        end_year: end.and_then(|d| d.year()),
        end_month: end.and_then(|d| d.month()),
        funding_agency: organization_name(funding.organization.as_ref()),
        funding_amount,
        currency,
        role,
        description: funding
            .short_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        url: text(&funding.url).map(str::to_string),
    })
}

fn organization_name(org: Option<&super::types::Organization>) -> Option<String> {
    org.and_then(|o| o.name.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rows with a missing or malformed ORCID iD are dropped.
pub fn search_hits(result: &ExpandedSearchResult) -> Vec<SearchHit> {
    result
        .expanded_result
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|row| {
            let orcid_id = OrcidId::parse(row.orcid_id.as_deref()?).ok()?;
            let clean = |v: &Option<String>| {
                v.as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let given_names = clean(&row.given_names);
            let family_names = clean(&row.family_names);
            let credit_name = clean(&row.credit_name);
            Some(SearchHit {
                display_name: display_name(
                    credit_name.as_deref(),
                    given_names.as_deref(),
                    family_names.as_deref(),
                    orcid_id.as_str(),
                ),
                orcid_id,
                given_names,
                family_names,
                credit_name,
                institutions: row.institution_name.clone().unwrap_or_default(),
                emails: row.email.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner() -> OrcidId {
        OrcidId::parse("0000-0002-1825-0097").unwrap()
    }

    fn sample_record() -> Record {
        serde_json::from_value(json!({
            "orcid-identifier": { "path": "0000-0002-1825-0097" },
            "person": {
                "name": {
                    "given-names": { "value": "Josiah" },
                    "family-name": { "value": "Carberry" },
                    "credit-name": null
                },
                "biography": { "content": "  Psychoceramics.  " },
                "keywords": { "keyword": [
                    { "content": "Psychoceramics" },
                    { "content": " psychoceramics " },
                    { "content": "" },
                    { "content": "Cracked pots" }
                ]},
                "researcher-urls": { "researcher-url": [
                    { "url-name": "Homepage", "url": { "value": "https://example.edu/~jc" } },
                    { "url-name": null, "url": { "value": "https://blog.example.org" } }
                ]},
                "emails": { "email": [
                    { "email": "hidden@example.edu", "visibility": "limited" },
                    { "email": "jc@example.edu", "visibility": "public" }
                ]}
            },
            "activities-summary": {
                "employments": { "affiliation-group": [
                    { "summaries": [{ "employment-summary": {
                        "organization": { "name": "Old College" },
                        "end-date": { "year": { "value": "2001" } }
                    }}]},
                    { "summaries": [{ "employment-summary": {
                        "organization": { "name": "Brown University" },
                        "end-date": null
                    }}]}
                ]},
                "works": { "group": [
                    { "work-summary": [
                        {
                            "put-code": 101,
                            "title": { "title": { "value": "The Psychoceramics of Cracked Pots" } },
                            "type": "journal-article",
                            "publication-date": { "year": { "value": "2012" } },
                            "journal-title": { "value": "Journal of Psychoceramics" },
                            "external-ids": { "external-id": [
                                { "external-id-type": "issn", "external-id-value": "0264-3561" },
                                { "external-id-type": "doi", "external-id-value": "10.5555/12345678",
                                  "external-id-url": { "value": "https://doi.org/10.5555/12345678" } }
                            ]},
                            "source": { "source-name": { "value": "Crossref" } }
                        },
                        {
                            "put-code": 102,
                            "title": { "title": { "value": "Duplicate from another source" } }
                        }
                    ]},
                    { "work-summary": [
                        { "put-code": 103, "title": null }
                    ]}
                ]},
                "fundings": { "group": [
                    { "funding-summary": [{
                        "put-code": 201,
                        "title": { "title": { "value": "Cracked Pot Survey" } },
                        "start-date": { "year": { "value": "2015" }, "month": { "value": "09" } },
                        "end-date": { "year": { "value": "2018" } },
                        "organization": { "name": "National Science Foundation" }
                    }]}
                ]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn maps_person_fields() {
        let profile = profile_from_record(&owner(), &sample_record());
        let r = &profile.researcher;
        assert_eq!(r.orcid_id.as_deref(), Some("0000-0002-1825-0097"));
        assert_eq!(r.given_names.as_deref(), Some("Josiah"));
        assert_eq!(r.family_name.as_deref(), Some("Carberry"));
        assert_eq!(r.credit_name, None);
        assert_eq!(r.biography.as_deref(), Some("Psychoceramics."));
        assert_eq!(r.email.as_deref(), Some("jc@example.edu"));
        assert_eq!(profile.display_name, "Josiah Carberry");
    }

    #[test]
    fn research_areas_are_deduplicated() {
        let profile = profile_from_record(&owner(), &sample_record());
        assert_eq!(
            profile.researcher.research_areas,
            Some(vec!["Psychoceramics".to_string(), "Cracked pots".to_string()])
        );
    }

    #[test]
    fn links_fall_back_to_url_as_name() {
        let profile = profile_from_record(&owner(), &sample_record());
        let links = profile.researcher.external_links.unwrap();
        assert_eq!(links[0].name, "Homepage");
        assert_eq!(links[1].name, "https://blog.example.org");
    }

    #[test]
    fn institution_prefers_open_employment() {
        let profile = profile_from_record(&owner(), &sample_record());
        assert_eq!(profile.researcher.institution.as_deref(), Some("Brown University"));
    }

    #[test]
    fn works_use_first_summary_and_prefer_doi() {
        let profile = profile_from_record(&owner(), &sample_record());
        // The untitled group is skipped
        assert_eq!(profile.publications.len(), 1);
        let p = &profile.publications[0];
        assert_eq!(p.put_code, Some(101));
        assert_eq!(p.title, "The Psychoceramics of Cracked Pots");
        assert_eq!(p.publication_year, Some(2012));
        assert_eq!(p.work_type.as_deref(), Some("journal-article"));
        assert_eq!(p.identifier_type.as_deref(), Some("doi"));
        assert_eq!(p.identifier_value.as_deref(), Some("10.5555/12345678"));
        assert_eq!(p.url.as_deref(), Some("https://doi.org/10.5555/12345678"));
        assert_eq!(p.source.as_deref(), Some("Crossref"));
    }

    #[test]
    fn fundings_map_period_and_agency() {
        let profile = profile_from_record(&owner(), &sample_record());
        let project = &profile.projects[0];
        assert_eq!(project.name, "Cracked Pot Survey");
        assert_eq!(project.start_year, Some(2015));
        assert_eq!(project.start_month, Some(9));
        assert_eq!(project.end_year, Some(2018));
        assert_eq!(project.end_month, None);
        assert_eq!(project.funding_agency.as_deref(), Some("National Science Foundation"));
    }

    #[test]
    fn work_detail_collects_authors() {
        let work: Work = serde_json::from_value(json!({
            "put-code": 101,
            "title": { "title": { "value": "Cracked Pots" } },
            "type": "JOURNAL_ARTICLE",
            "short-description": "About pots.",
            "contributors": { "contributor": [
                { "credit-name": { "value": "Josiah Carberry" },
                  "contributor-orcid": { "path": "0000-0002-1825-0097" } },
                { "credit-name": { "value": "Jane Doe" },
                  "contributor-orcid": { "path": "not-an-orcid" } },
                { "credit-name": null }
            ]}
        }))
        .unwrap();

        let p = publication_from_work_detail(&work).unwrap();
        assert_eq!(p.work_type.as_deref(), Some("journal-article"));
        assert_eq!(p.description.as_deref(), Some("About pots."));
        assert_eq!(
            p.authors,
            vec![
                AuthorInput { name: "Josiah Carberry".into(), orcid_id: Some("0000-0002-1825-0097".into()) },
                AuthorInput { name: "Jane Doe".into(), orcid_id: None },
            ]
        );
    }

    #[test]
    fn funding_detail_reads_amount_and_owner_role() {
        let funding: Funding = serde_json::from_value(json!({
            "put-code": 201,
            "title": { "title": { "value": "Cracked Pot Survey" } },
            "amount": { "value": "1,250,000", "currency-code": "usd" },
            "contributors": { "contributor": [
                { "contributor-orcid": { "path": "0000-0002-1694-233X" },
                  "contributor-attributes": { "contributor-role": "co-lead" } },
                { "contributor-orcid": { "uri": "https://orcid.org/0000-0002-1825-0097" },
                  "contributor-attributes": { "contributor-role": "LEAD" } }
            ]}
        }))
        .unwrap();

        let project = project_from_funding_detail(&funding, &owner()).unwrap();
        assert_eq!(project.funding_amount, Some(Decimal::from(1_250_000)));
        assert_eq!(project.currency.as_deref(), Some("USD"));
        assert_eq!(project.role.as_deref(), Some("lead"));
    }

    #[test]
    fn search_hits_skip_invalid_ids() {
        let result: ExpandedSearchResult = serde_json::from_value(json!({
            "expanded-result": [
                { "orcid-id": "0000-0002-1825-0097", "given-names": "Josiah", "family-names": "Carberry",
                  "institution-name": ["Brown University"] },
                { "orcid-id": "garbage" },
                { "given-names": "No id" }
            ],
            "num-found": 3
        }))
        .unwrap();

        let hits = search_hits(&result);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Josiah Carberry");
        assert_eq!(hits[0].institutions, vec!["Brown University".to_string()]);
    }
}
