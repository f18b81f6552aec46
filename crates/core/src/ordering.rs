//! Ordering of product listings.
//!
//! `ordering=<term>[,<term>...]` where a term is a core field or
//! `<namespace>__<field>`, optionally prefixed with `-` for descending
//! order. Terms that name no orderable column are dropped; when nothing
//! valid remains the default ordering applies.

use crate::config::ArchiveConfig;
use crate::field::FieldType;
use crate::schema::{core_field, DEFAULT_ORDERING};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderColumn {
    Core(&'static str),
    Namespace { namespace: String, field: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: OrderColumn,
    pub descending: bool,
}

/// Resolve the `ordering` parameter against the archive's columns.
pub fn parse_ordering(config: &ArchiveConfig, raw: Option<&str>) -> Vec<OrderTerm> {
    let terms: Vec<OrderTerm> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| resolve_term(config, t))
        .collect();

    if terms.is_empty() {
        default_ordering()
    } else {
        terms
    }
}

pub fn default_ordering() -> Vec<OrderTerm> {
    vec![OrderTerm {
        column: OrderColumn::Core(DEFAULT_ORDERING),
        descending: false,
    }]
}

fn resolve_term(config: &ArchiveConfig, term: &str) -> Option<OrderTerm> {
    let (descending, name) = match term.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, term),
    };
    resolve_column(config, name).map(|column| OrderTerm { column, descending })
}

fn resolve_column(config: &ArchiveConfig, name: &str) -> Option<OrderColumn> {
    if let Some((ns, field)) = name.split_once("__") {
        let def = config.namespace(ns)?.field(field)?;
        return (def.field_type != FieldType::Geometry).then(|| OrderColumn::Namespace {
            namespace: ns.to_string(),
            field: field.to_string(),
        });
    }
    let def = core_field(name)?;
    (def.field_type != FieldType::Geometry).then_some(OrderColumn::Core(def.name))
}
