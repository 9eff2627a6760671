use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use super::client::OrcidClient;
use super::error::OrcidError;
use super::mapping::{search_hits, SearchHit};

/// One page of expanded-search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub num_found: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub num_found: u64,
    pub pages_fetched: u32,
    pub truncated: bool,
}

/// Anything that can serve a page of researcher search results.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search_page(&self, query: &str, start: u64, rows: u32) -> Result<SearchPage, OrcidError>;
}

#[async_trait]
impl SearchSource for OrcidClient {
    async fn search_page(&self, query: &str, start: u64, rows: u32) -> Result<SearchPage, OrcidError> {
        let result = self.expanded_search(query, start, rows).await?;
        Ok(SearchPage {
            hits: search_hits(&result),
            num_found: result.num_found,
        })
    }
}

/// Structured search fields, combined into an ORCID Solr query by [`build_query`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub given_names: Option<String>,
    pub family_name: Option<String>,
    pub affiliation: Option<String>,
    pub keyword: Option<String>,
}

pub fn build_query(params: &SearchParams) -> Result<String, OrcidError> {
    let mut clauses = Vec::new();

    if let Some(q) = non_blank(&params.q) {
        clauses.push(q.to_string());
    }
    let fields = [
        ("given-names", &params.given_names),
        ("family-name", &params.family_name),
        ("affiliation-org-name", &params.affiliation),
        ("keyword", &params.keyword),
    ];
    for (field, value) in fields {
        if let Some(v) = non_blank(value) {
            clauses.push(format!("{}:{}", field, quote_term(v)));
        }
    }

    if clauses.is_empty() {
        return Err(OrcidError::EmptyQuery);
    }
    Ok(clauses.join(" AND "))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn quote_term(value: &str) -> String {
    if value.contains(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Pulls successive pages until everything ORCID reports is collected, a page
/// comes back empty, or `max_results` is reached. Hits are de-duplicated by
/// ORCID iD keeping the first occurrence.
pub async fn accumulate<S>(source: &S, query: &str, page_size: u32, max_results: u32) -> Result<SearchOutcome, OrcidError>
where
    S: SearchSource + ?Sized,
{
    let query = query.trim();
    if query.is_empty() {
        return Err(OrcidError::EmptyQuery);
    }

    let page_size = page_size.max(1);
    let max_results = max_results as usize;

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut seen = HashSet::new();
    let mut num_found = 0u64;
    let mut start = 0u64;
    let mut pages_fetched = 0u32;

    while hits.len() < max_results {
        let remaining = (max_results - hits.len()).min(page_size as usize) as u32;
        let page = source.search_page(query, start, remaining).await?;
        pages_fetched += 1;
        num_found = page.num_found;

        let returned = page.hits.len() as u64;
        for hit in page.hits {
            if hits.len() >= max_results {
                break;
            }
            if seen.insert(hit.orcid_id.clone()) {
                hits.push(hit);
            }
        }

        start += u64::from(remaining);
        if returned == 0 || start >= num_found {
            break;
        }
    }

    let truncated = (hits.len() as u64) < num_found && start < num_found;

    info!(
        "ORCID search '{}': {} hits of {} in {} page(s){}",
        query,
        hits.len(),
        num_found,
        pages_fetched,
        if truncated { " (truncated)" } else { "" }
    );

    Ok(SearchOutcome {
        hits,
        num_found,
        pages_fetched,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orcid::identifier::OrcidId;
    use std::sync::Mutex;

    /// Serves hits from a fixed list of ORCID iDs, recording each request.
    struct FakeSource {
        ids: Vec<String>,
        num_found: Option<u64>,
        calls: Mutex<Vec<(u64, u32)>>,
    }

    impl FakeSource {
        fn new(ids: Vec<String>) -> Self {
            Self { ids, num_found: None, calls: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> Vec<(u64, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn hit(id: &str) -> SearchHit {
        let orcid_id = OrcidId::parse(id).unwrap();
        SearchHit {
            display_name: orcid_id.to_string(),
            orcid_id,
            given_names: None,
            family_names: None,
            credit_name: None,
            institutions: vec![],
            emails: vec![],
        }
    }

    #[async_trait]
    impl SearchSource for FakeSource {
        async fn search_page(&self, _query: &str, start: u64, rows: u32) -> Result<SearchPage, OrcidError> {
            self.calls.lock().unwrap().push((start, rows));
            let hits = self
                .ids
                .iter()
                .skip(start as usize)
                .take(rows as usize)
                .map(|id| hit(id))
                .collect();
            Ok(SearchPage {
                hits,
                num_found: self.num_found.unwrap_or(self.ids.len() as u64),
            })
        }
    }

    // Valid ORCID iDs with computed check digits
    fn ids(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let base = format!("{:015}", 100_000 + i);
                let total = base
                    .bytes()
                    .map(|b| u32::from(b - b'0'))
                    .fold(0u32, |acc, d| (acc + d) * 2);
                let check = match (12 - total % 11) % 11 {
                    10 => 'X',
                    d => char::from_digit(d, 10).unwrap(),
                };
                format!("{}-{}-{}-{}{}", &base[0..4], &base[4..8], &base[8..12], &base[12..15], check)
            })
            .collect()
    }

    #[tokio::test]
    async fn collects_every_page() {
        let source = FakeSource::new(ids(25));
        let outcome = accumulate(&source, "carberry", 10, 1000).await.unwrap();
        assert_eq!(outcome.hits.len(), 25);
        assert_eq!(outcome.pages_fetched, 3);
        assert!(!outcome.truncated);
        assert_eq!(source.calls(), vec![(0, 10), (10, 10), (20, 10)]);
    }

    #[tokio::test]
    async fn stops_at_max_results_and_asks_only_for_remainder() {
        let source = FakeSource::new(ids(50));
        let outcome = accumulate(&source, "carberry", 20, 45).await.unwrap();
        assert_eq!(outcome.hits.len(), 45);
        assert!(outcome.truncated);
        assert_eq!(outcome.num_found, 50);
        assert_eq!(source.calls(), vec![(0, 20), (20, 20), (40, 5)]);
    }

    #[tokio::test]
    async fn stops_on_empty_page_even_if_more_reported() {
        let mut source = FakeSource::new(ids(5));
        source.num_found = Some(100);
        let outcome = accumulate(&source, "carberry", 5, 1000).await.unwrap();
        assert_eq!(outcome.hits.len(), 5);
        assert_eq!(outcome.pages_fetched, 2);
    }

    #[tokio::test]
    async fn removes_duplicates_across_pages() {
        let mut list = ids(4);
        list.insert(2, list[0].clone());
        let source = FakeSource::new(list);
        let outcome = accumulate(&source, "carberry", 2, 1000).await.unwrap();
        let got: Vec<_> = outcome.hits.iter().map(|h| h.orcid_id.to_string()).collect();
        assert_eq!(got, ids(4));
    }

    #[tokio::test]
    async fn rejects_blank_query_without_calling_source() {
        let source = FakeSource::new(ids(3));
        let err = accumulate(&source, "   ", 10, 100).await.unwrap_err();
        assert!(matches!(err, OrcidError::EmptyQuery));
        assert!(source.calls().is_empty());
    }

    #[test]
    fn builds_fielded_queries() {
        let params = SearchParams {
            q: Some(" pots ".into()),
            family_name: Some("Carberry".into()),
            affiliation: Some("Brown University".into()),
            ..Default::default()
        };
        assert_eq!(
            build_query(&params).unwrap(),
            "pots AND family-name:Carberry AND affiliation-org-name:\"Brown University\""
        );
        assert!(matches!(build_query(&SearchParams::default()), Err(OrcidError::EmptyQuery)));
    }
}
