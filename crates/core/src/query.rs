//! Request query validation.
//!
//! Every request, whatever its method, is checked against the set of
//! parameters the archive understands before anything touches the
//! database.

use crate::error::CoreError;
use crate::filter::{FilterSet, Predicate};
use crate::ordering::{parse_ordering, OrderTerm};
use crate::pagination::{PageRequest, PaginationConfig, PAGE_QUERY_PARAM};
use crate::config::{ArchiveConfig, DEFAULT_MODE};

pub const MODE_PARAM: &str = "mode";
pub const FORMAT_PARAM: &str = "format";
pub const ORDERING_PARAM: &str = "ordering";

/// Raw query-string pairs in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Last value given for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Reject unknown parameter names and unsupported formats.
pub fn validate_params(
    params: &QueryParams,
    filters: &FilterSet,
    pagination: &PaginationConfig,
) -> Result<(), CoreError> {
    let paging = pagination.query_params();
    for (name, _) in params.iter() {
        let known = matches!(name, MODE_PARAM | FORMAT_PARAM | ORDERING_PARAM)
            || paging.contains(&name)
            || filters.contains(name);
        if !known {
            return Err(CoreError::BadRequest(format!("Invalid query param: \"{name}\"")));
        }
    }

    if let Some(format) = params.get(FORMAT_PARAM) {
        if format != "json" {
            return Err(CoreError::BadRequest(format!(
                "Invalid value for query param \"{FORMAT_PARAM}\": \"{format}\""
            )));
        }
    }
    Ok(())
}

/// Everything a listing needs from the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub mode: String,
    pub ordering: Vec<OrderTerm>,
    pub page: Option<PageRequest>,
    pub predicates: Vec<Predicate>,
}

impl ListQuery {
    /// Assumes `params` already passed [`validate_params`].
    pub fn from_params(
        params: &QueryParams,
        config: &ArchiveConfig,
        filters: &FilterSet,
        pagination: &PaginationConfig,
    ) -> Result<Self, CoreError> {
        let page = pagination.resolve(
            params.get(PAGE_QUERY_PARAM),
            params.get(&pagination.page_size_query_param),
        )?;

        Ok(Self {
            mode: params.get(MODE_PARAM).unwrap_or(DEFAULT_MODE).to_string(),
            ordering: parse_ordering(config, params.get(ORDERING_PARAM)),
            page,
            predicates: filters.parse(params.iter())?,
        })
    }
}
