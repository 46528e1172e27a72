//! Page-number pagination.
//!
//! Lists are wrapped in `{count, next, previous, results}`. `next` and
//! `previous` are absolute links built from the incoming request, or `null`
//! at either end.

use axum::http::{header, HeaderMap, Uri};
use serde::{Deserialize, Serialize};

use super::types::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Raw `?page=` value; kept as text so garbage maps to "Invalid page." rather
/// than a query rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Requested page before the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Last,
    Number(u64),
}

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: PageNumber,
    pub size: u64,
}

/// A page known to exist for the current total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn parse(query: &PageQuery, size: u64) -> Result<Self, ApiError> {
        let number = match query.page.as_deref().map(str::trim) {
            None | Some("") => PageNumber::Number(1),
            Some("last") => PageNumber::Last,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 => PageNumber::Number(n),
                _ => return Err(ApiError::invalid_page()),
            },
        };
        Ok(Self { number, size })
    }

    /// Resolves `last` against the total and rejects pages past the end.
    /// Page 1 is always valid, even for an empty list.
    pub fn resolve(self, count: u64) -> Result<Page, ApiError> {
        let pages = num_pages(count, self.size);
        match self.number {
            PageNumber::Last => Ok(Page { number: pages, size: self.size }),
            PageNumber::Number(n) if n <= pages => Ok(Page { number: n, size: self.size }),
            PageNumber::Number(_) => Err(ApiError::invalid_page()),
        }
    }
}

impl Page {
    pub fn offset(&self) -> u64 { (self.number - 1).saturating_mul(self.size) }
}

pub fn num_pages(count: u64, size: u64) -> u64 {
    count.div_ceil(size).max(1)
}

impl<T> Paginated<T> {
    pub fn new(results: Vec<T>, count: u64, page: Page, base_url: &str) -> Self {
        let pages = num_pages(count, page.size);
        Self {
            count,
            next: (page.number < pages).then(|| format!("{base_url}?page={}", page.number + 1)),
            previous: match page.number {
                1 => None,
                2 => Some(base_url.to_string()),
                n => Some(format!("{base_url}?page={}", n - 1)),
            },
            results,
        }
    }
}

/// Absolute URL of the current resource, without its query string.
pub fn base_url(uri: &Uri, headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or("localhost");
    let scheme = if super::security::is_secure(uri, headers) { "https" } else { "http" };
    format!("{scheme}://{host}{}", uri.path())
}
