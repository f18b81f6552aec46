//! Page-number pagination.
//!
//! Listings are paginated only when a default `page_size` is configured.
//! Clients may pick their own page size through the page-size query
//! parameter only when `max_page_size` is configured as well.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name of the page-number query parameter.
pub const PAGE_QUERY_PARAM: &str = "page";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub max_page_size: Option<u64>,
    #[serde(default = "default_page_size_query_param")]
    pub page_size_query_param: String,
}

fn default_page_size_query_param() -> String {
    "page_size".to_string()
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            max_page_size: None,
            page_size_query_param: default_page_size_query_param(),
        }
    }
}

impl PaginationConfig {
    /// Query parameter names understood by the paginator.
    pub fn query_params(&self) -> Vec<&str> {
        let mut params = vec![PAGE_QUERY_PARAM];
        if self.max_page_size.is_some() {
            params.push(self.page_size_query_param.as_str());
        }
        params
    }

    /// Resolve the requested page. Returns `None` when listings are not paginated.
    pub fn resolve(
        &self,
        page: Option<&str>,
        page_size: Option<&str>,
    ) -> Result<Option<PageRequest>, CoreError> {
        let Some(default_size) = self.page_size else {
            return Ok(None);
        };

        let size = match (self.max_page_size, page_size) {
            (Some(max), Some(raw)) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n.min(max),
                _ => default_size,
            },
            _ => default_size,
        };

        let number = match page {
            None | Some("") => 1,
            Some("last") => return Ok(Some(PageRequest::last(size))),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid_page()),
            },
        };

        Ok(Some(PageRequest {
            number: PageNumber::Number(number),
            size: size.max(1),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(u64),
    Last,
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: PageNumber,
    pub size: u64,
}

impl PageRequest {
    fn last(size: u64) -> Self {
        Self {
            number: PageNumber::Last,
            size: size.max(1),
        }
    }

    /// Number of pages for `count` rows. An empty listing still has one page.
    pub fn page_count(&self, count: u64) -> u64 {
        count.div_ceil(self.size).max(1)
    }

    /// Pin the page number against the row count. Pages past the end are
    /// rejected, except page 1 which always exists.
    pub fn locate(&self, count: u64) -> Result<Page, CoreError> {
        let pages = self.page_count(count);
        let number = match self.number {
            PageNumber::Last => pages,
            PageNumber::Number(n) if n <= pages => n,
            PageNumber::Number(_) => return Err(invalid_page()),
        };
        Ok(Page {
            number,
            size: self.size,
            pages,
        })
    }
}

/// A page pinned against a known row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
    pub pages: u64,
}

impl Page {
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.size
    }

    pub fn limit(&self) -> u64 {
        self.size
    }

    pub fn has_next(&self) -> bool {
        self.number < self.pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

fn invalid_page() -> CoreError {
    CoreError::InvalidPage
}
