//! Serde models for the subset of the ORCID v3.0 JSON the service reads.
//!
//! ORCID omits or nulls fields freely, so nearly everything is optional and
//! defaulted. Field names follow ORCID's kebab-case keys.

use serde::{Deserialize, Serialize};

/// ORCID wraps most scalars as `{"value": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Value<T> {
    pub value: T,
}

pub type StringValue = Option<Value<String>>;

pub fn text(v: &StringValue) -> Option<&str> {
    v.as_ref()
        .map(|w| w.value.trim())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Record {
    pub orcid_identifier: Option<OrcidIdentifier>,
    pub person: Option<Person>,
    pub activities_summary: Option<ActivitiesSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrcidIdentifier {
    pub uri: Option<String>,
    pub path: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Person {
    pub name: Option<PersonName>,
    pub biography: Option<Biography>,
    pub keywords: Option<Keywords>,
    pub researcher_urls: Option<ResearcherUrls>,
    pub emails: Option<Emails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PersonName {
    #[serde(default)]
    pub given_names: StringValue,
    #[serde(default)]
    pub family_name: StringValue,
    #[serde(default)]
    pub credit_name: StringValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Biography {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Keywords {
    #[serde(default)]
    pub keyword: Vec<Keyword>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Keyword {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResearcherUrls {
    #[serde(default)]
    pub researcher_url: Vec<ResearcherUrl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResearcherUrl {
    pub url_name: Option<String>,
    #[serde(default)]
    pub url: StringValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Emails {
    #[serde(default)]
    pub email: Vec<Email>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Email {
    pub email: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivitiesSummary {
    pub employments: Option<Employments>,
    pub works: Option<Works>,
    pub fundings: Option<Fundings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Employments {
    #[serde(default)]
    pub affiliation_group: Vec<AffiliationGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffiliationGroup {
    #[serde(default)]
    pub summaries: Vec<AffiliationSummaryWrapper>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AffiliationSummaryWrapper {
    pub employment_summary: Option<AffiliationSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AffiliationSummary {
    pub department_name: Option<String>,
    pub role_title: Option<String>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub organization: Option<Organization>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organization {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FuzzyDate {
    #[serde(default)]
    pub year: StringValue,
    #[serde(default)]
    pub month: StringValue,
    #[serde(default)]
    pub day: StringValue,
}

impl FuzzyDate {
    pub fn year(&self) -> Option<i32> {
        text(&self.year).and_then(|s| s.parse().ok())
    }

    pub fn month(&self) -> Option<i32> {
        text(&self.month)
            .and_then(|s| s.parse().ok())
            .filter(|m| (1..=12).contains(m))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Works {
    #[serde(default)]
    pub group: Vec<WorkGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkGroup {
    #[serde(default)]
    pub work_summary: Vec<WorkSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkSummary {
    pub put_code: Option<i64>,
    pub title: Option<WorkTitle>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub publication_date: Option<FuzzyDate>,
    #[serde(default)]
    pub journal_title: StringValue,
    pub external_ids: Option<ExternalIds>,
    #[serde(default)]
    pub url: StringValue,
    pub source: Option<Source>,
}

/// Full `/work/{put-code}` payload; a superset of the summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Work {
    pub put_code: Option<i64>,
    pub title: Option<WorkTitle>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub publication_date: Option<FuzzyDate>,
    #[serde(default)]
    pub journal_title: StringValue,
    pub short_description: Option<String>,
    pub external_ids: Option<ExternalIds>,
    #[serde(default)]
    pub url: StringValue,
    pub source: Option<Source>,
    pub contributors: Option<Contributors>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkTitle {
    #[serde(default)]
    pub title: StringValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExternalIds {
    #[serde(default)]
    pub external_id: Vec<ExternalId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExternalId {
    pub external_id_type: Option<String>,
    pub external_id_value: Option<String>,
    #[serde(default)]
    pub external_id_url: StringValue,
    pub external_id_relationship: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Source {
    #[serde(default)]
    pub source_name: StringValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contributors {
    #[serde(default)]
    pub contributor: Vec<Contributor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contributor {
    pub contributor_orcid: Option<OrcidIdentifier>,
    #[serde(default)]
    pub credit_name: StringValue,
    pub contributor_attributes: Option<ContributorAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContributorAttributes {
    pub contributor_sequence: Option<String>,
    pub contributor_role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundings {
    #[serde(default)]
    pub group: Vec<FundingGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FundingGroup {
    #[serde(default)]
    pub funding_summary: Vec<FundingSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FundingSummary {
    pub put_code: Option<i64>,
    pub title: Option<WorkTitle>,
    #[serde(rename = "type")]
    pub funding_type: Option<String>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub organization: Option<Organization>,
    #[serde(default)]
    pub url: StringValue,
}

/// Full `/funding/{put-code}` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Funding {
    pub put_code: Option<i64>,
    pub title: Option<WorkTitle>,
    #[serde(rename = "type")]
    pub funding_type: Option<String>,
    pub short_description: Option<String>,
    pub amount: Option<Amount>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub organization: Option<Organization>,
    #[serde(default)]
    pub url: StringValue,
    pub contributors: Option<FundingContributors>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Amount {
    pub value: Option<String>,
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingContributors {
    #[serde(default)]
    pub contributor: Vec<FundingContributor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FundingContributor {
    pub contributor_orcid: Option<OrcidIdentifier>,
    #[serde(default)]
    pub credit_name: StringValue,
    pub contributor_attributes: Option<ContributorAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExpandedSearchResult {
    #[serde(default)]
    pub expanded_result: Option<Vec<ExpandedResult>>,
    #[serde(default)]
    pub num_found: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExpandedResult {
    pub orcid_id: Option<String>,
    pub given_names: Option<String>,
    pub family_names: Option<String>,
    pub credit_name: Option<String>,
    #[serde(default)]
    pub other_name: Option<Vec<String>>,
    #[serde(default)]
    pub email: Option<Vec<String>>,
    #[serde(default)]
    pub institution_name: Option<Vec<String>>,
}

/// OAuth token endpoint response for the authorization-code grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub name: Option<String>,
    pub orcid: String,
}
