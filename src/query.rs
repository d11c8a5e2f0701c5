//! Turns list parameters into a filter, an ordering and a page window.
//!
//! Only whitelisted column names ever reach the generated SQL. User supplied
//! values are always bound as parameters.

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

use crate::models::JobStatus;
use crate::validate::ValidationErrors;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Raw list parameters as they arrive on the query string.
///
/// Everything is kept as text so bad values can be reported per field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    AppliedDate,
    Company,
    Position,
    Status,
}

impl SortField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "appliedDate" => Some(SortField::AppliedDate),
            "company" => Some(SortField::Company),
            "position" => Some(SortField::Position),
            "status" => Some(SortField::Status),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            SortField::AppliedDate => "applied_date",
            SortField::Company => "company COLLATE NOCASE",
            SortField::Position => "position COLLATE NOCASE",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::AppliedDate,
            direction: SortDirection::Desc,
        }
    }
}

impl Sort {
    /// Parses `<field>_<direction>`, e.g. `appliedDate_desc`.
    pub fn parse(s: &str) -> Option<Self> {
        let (field, direction) = s.rsplit_once('_')?;
        Some(Self {
            field: SortField::parse(field)?,
            direction: SortDirection::parse(direction)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub text: Option<String>,
    pub status: Option<JobStatus>,
    pub sort: Sort,
    pub page: u32,
    pub limit: u32,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            text: None,
            status: None,
            sort: Sort::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// A `WHERE` clause plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl JobQuery {
    pub fn parse(params: &ListParams, limits: PageLimits) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let text = params
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(s) => match s.parse::<JobStatus>() {
                Ok(status) => Some(status),
                Err(e) => {
                    errors.push("status", e.to_string());
                    None
                }
            },
        };

        let sort = match params.sort.as_deref().filter(|s| !s.is_empty()) {
            None => Sort::default(),
            Some(s) => Sort::parse(s).unwrap_or_else(|| {
                errors.push(
                    "sort",
                    "must be one of appliedDate, company, position, status followed by _asc or _desc",
                );
                Sort::default()
            }),
        };

        let page = match params.page.as_deref() {
            None => 1,
            Some(s) => match s.trim().parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => {
                    errors.push("page", "must be a positive integer");
                    1
                }
            },
        };

        let limit = match params.limit.as_deref() {
            None => limits.default_limit,
            Some(s) => match s.trim().parse::<u32>() {
                Ok(limit) if (1..=limits.max_limit).contains(&limit) => limit,
                _ => {
                    errors.push(
                        "limit",
                        format!("must be an integer between 1 and {}", limits.max_limit),
                    );
                    limits.default_limit
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            text,
            status,
            sort,
            page,
            limit,
        })
    }

    /// Number of matching rows skipped before this page.
    pub fn offset(&self) -> u64 {
        (u64::from(self.page) - 1) * u64::from(self.limit)
    }

    pub fn filter(&self) -> Filter {
        let mut sql = String::from("WHERE 1=1");
        let mut params: Vec<SqlValue> = vec![];

        if let Some(text) = &self.text {
            let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
            params.push(SqlValue::Text(pattern));
            let like = params.len();
            params.push(SqlValue::Text(text.clone()));
            let tag = params.len();
            sql.push_str(&format!(
                " AND (unicode_lower(company) LIKE ?{like} ESCAPE '\\'
                   OR unicode_lower(position) LIKE ?{like} ESCAPE '\\'
                   OR EXISTS (SELECT 1 FROM json_each(job_applications.tags) WHERE json_each.value = ?{tag}))"
            ));
        }

        if let Some(status) = self.status {
            params.push(SqlValue::Text(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }

        Filter { sql, params }
    }

    /// `ORDER BY` clause. Ties fall back to `id` so pages never overlap.
    pub fn order_by(&self) -> String {
        let dir = self.sort.direction.keyword();
        format!("ORDER BY {} {dir}, id {dir}", self.sort.field.column())
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Pagination metadata returned next to a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, query: &JobQuery) -> Self {
        Self {
            total,
            page: query.page,
            limit: query.limit,
            pages: total.div_ceil(u64::from(query.limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut p = ListParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "q" => p.q = v,
                "status" => p.status = v,
                "sort" => p.sort = v,
                "page" => p.page = v,
                "limit" => p.limit = v,
                _ => panic!("unknown param {k}"),
            }
        }
        p
    }

    #[test]
    fn test_defaults() {
        let query = JobQuery::parse(&ListParams::default(), PageLimits::default()).unwrap();
        assert_eq!(query, JobQuery::default());
        assert_eq!(query.offset(), 0);
        assert_eq!(query.order_by(), "ORDER BY applied_date DESC, id DESC");
        assert_eq!(query.filter().sql, "WHERE 1=1");
    }

    #[test]
    fn test_default_limit_comes_from_limits() {
        let limits = PageLimits {
            default_limit: 25,
            max_limit: 100,
        };
        let query = JobQuery::parse(&ListParams::default(), limits).unwrap();
        assert_eq!(query.limit, 25);
    }

    #[test]
    fn test_sort_whitelist() {
        assert_eq!(
            Sort::parse("company_asc"),
            Some(Sort {
                field: SortField::Company,
                direction: SortDirection::Asc
            })
        );
        assert_eq!(
            Sort::parse("appliedDate_asc").map(|s| s.field),
            Some(SortField::AppliedDate)
        );
        assert_eq!(Sort::parse("status_desc").map(|s| s.direction), Some(SortDirection::Desc));
        assert_eq!(Sort::parse("company"), None);
        assert_eq!(Sort::parse("company_sideways"), None);
        assert_eq!(Sort::parse("id; DROP TABLE job_applications_asc"), None);
        assert_eq!(Sort::parse("notes_asc"), None);
    }

    #[test]
    fn test_position_sort_sql() {
        let query = JobQuery::parse(&params(&[("sort", "position_asc")]), PageLimits::default()).unwrap();
        assert_eq!(query.order_by(), "ORDER BY position COLLATE NOCASE ASC, id ASC");
    }

    #[test]
    fn test_invalid_params_are_reported_together() {
        let err = JobQuery::parse(
            &params(&[
                ("status", "HIRED"),
                ("sort", "salary_desc"),
                ("page", "0"),
                ("limit", "abc"),
            ]),
            PageLimits::default(),
        )
        .unwrap_err();
        assert!(err.has("status"));
        assert!(err.has("sort"));
        assert!(err.has("page"));
        assert!(err.has("limit"));
    }

    #[test]
    fn test_limit_bounds() {
        let limits = PageLimits::default();
        assert!(JobQuery::parse(&params(&[("limit", "0")]), limits).is_err());
        assert!(JobQuery::parse(&params(&[("limit", "1001")]), limits).is_err());
        assert!(JobQuery::parse(&params(&[("limit", "-5")]), limits).is_err());
        assert_eq!(JobQuery::parse(&params(&[("limit", "1000")]), limits).unwrap().limit, 1000);
    }

    #[test]
    fn test_offset_is_page_minus_one_times_limit() {
        let query = JobQuery::parse(&params(&[("page", "2"), ("limit", "5")]), PageLimits::default()).unwrap();
        assert_eq!(query.offset(), 5);
        let query = JobQuery::parse(&params(&[("page", "7"), ("limit", "10")]), PageLimits::default()).unwrap();
        assert_eq!(query.offset(), 60);
    }

    #[test]
    fn test_blank_q_and_status_are_ignored() {
        let query = JobQuery::parse(&params(&[("q", "   "), ("status", "")]), PageLimits::default()).unwrap();
        assert_eq!(query.text, None);
        assert_eq!(query.status, None);
    }

    #[test]
    fn test_filter_binds_values() {
        let query = JobQuery::parse(
            &params(&[("q", "Ac_me"), ("status", "OFFER")]),
            PageLimits::default(),
        )
        .unwrap();
        let filter = query.filter();
        assert_eq!(
            filter.params,
            vec![
                SqlValue::Text("%ac\\_me%".to_string()),
                SqlValue::Text("Ac_me".to_string()),
                SqlValue::Text("OFFER".to_string()),
            ]
        );
        assert!(filter.sql.contains("status = ?3"));
        assert!(filter.sql.contains("json_each.value = ?2"));
        assert!(!filter.sql.contains("Ac_me"));
    }

    #[test]
    fn test_page_meta() {
        let query = JobQuery {
            page: 2,
            limit: 5,
            ..JobQuery::default()
        };
        let meta = PageMeta::new(12, &query);
        assert_eq!(meta.pages, 3);
        assert_eq!(PageMeta::new(0, &query).pages, 0);
        assert_eq!(PageMeta::new(10, &query).pages, 2);
        assert_eq!(PageMeta::new(11, &query).pages, 3);
    }
}
