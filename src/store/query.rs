//! Pagination, sorting and filter parameters shared by every list endpoint.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_SORT_KEY: &str = "created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only the literal `"asc"` sorts ascending; everything else, including
    /// an empty value, falls back to descending.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Picks the requested sort column only when it appears in `allowed`.
/// The returned name is always one of the static entries, never caller text.
pub fn resolve_sort_key(requested: Option<&str>, allowed: &[&'static str]) -> &'static str {
    requested
        .and_then(|key| allowed.iter().copied().find(|column| *column == key))
        .unwrap_or(DEFAULT_SORT_KEY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn page_count(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.page_size - 1) / self.page_size
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: PageRequest,
    pub search: Option<String>,
    pub sort_key: Option<String>,
    pub sort_dir: SortDirection,
    pub archived: Option<bool>,
    pub trashed: Option<bool>,
}

impl ListQuery {
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub pages: i64,
}

/// Builds an `ILIKE` pattern matching `term` anywhere, with LIKE
/// metacharacters in the term taken literally.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
