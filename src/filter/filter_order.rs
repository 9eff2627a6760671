use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};

/// Sortable fields of one entity: API name → SQL column, plus the default order.
pub struct SortSpec {
    pub fields: &'static [(&'static str, &'static str)],
    pub default: &'static [FilterOrderInfo],
}

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `"year"`, `"-year"`, `"year desc"` or comma-separated combinations.
    /// An absent or blank spec yields the entity default.
    pub fn parse(spec: Option<&str>, sort_spec: &SortSpec) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let raw = match spec.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw,
            None => return Ok(sort_spec.default.to_vec()),
        };

        let mut out = Vec::new();
        for part in raw.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            let token = it.next().unwrap_or_default();
            let (name, mut sort) = match token.strip_prefix('-') {
                Some(name) => (name, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if let Some(dir) = it.next() {
                sort = match dir.to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Asc,
                    "desc" => SortDirection::Desc,
                    other => return Err(FilterError::InvalidDirection(other.to_string())),
                };
            }

            let column = sort_spec
                .fields
                .iter()
                .find(|(api, _)| api.eq_ignore_ascii_case(name))
                .map(|(_, column)| *column)
                .ok_or_else(|| FilterError::InvalidSort {
                    field: name.to_string(),
                    allowed: sort_spec
                        .fields
                        .iter()
                        .map(|(api, _)| *api)
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;
            out.push(FilterOrderInfo { column, sort });
        }

        if out.is_empty() {
            return Ok(sort_spec.default.to_vec());
        }
        Ok(out)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} {} NULLS LAST", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
