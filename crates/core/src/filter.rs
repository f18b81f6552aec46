//! Filter sets.
//!
//! Every archive gets one filter set, derived from its core and namespace
//! fields. A parameter is `<field>` for the exact lookup and
//! `<field>__<lookup>` otherwise; namespace fields are prefixed with
//! `<namespace>__`. Three relation filters are always present: `tag`
//! (comma-separated, any of), `source_product` and `derived_product`.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::ArchiveConfig;
use crate::datetime;
use crate::error::CoreError;
use crate::field::{FieldType, FieldValue, Lookup};
use crate::schema::{FieldDef, CORE_FIELDS};

pub const TAG_FILTER: &str = "tag";
pub const SOURCE_PRODUCT_FILTER: &str = "source_product";
pub const DERIVED_PRODUCT_FILTER: &str = "derived_product";

/// Column or relation a filter applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    Core(&'static str),
    Namespace { namespace: String, field: String },
    /// Products carrying any of the given tags.
    Tag,
    /// Products derived from the given product.
    SourceProduct,
    /// Products the given product was derived from.
    DerivedProduct,
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(FieldValue),
    List(Vec<FieldValue>),
    Range(FieldValue, FieldValue),
    IsNull(bool),
    /// Year, month or day number.
    Part(i32),
    Date(NaiveDate),
}

/// One decoded filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub target: FilterTarget,
    pub field_type: FieldType,
    pub lookup: Lookup,
    pub operand: Operand,
}

/// Definition of one accepted filter parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParam {
    pub target: FilterTarget,
    pub field_type: FieldType,
    pub lookup: Lookup,
}

#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    params: BTreeMap<String, FilterParam>,
}

impl FilterSet {
    pub fn for_archive(config: &ArchiveConfig) -> Self {
        let disabled: Vec<Lookup> = config
            .disabled_lookups
            .iter()
            .filter_map(|name| Lookup::from_name(name))
            .collect();

        let mut set = Self::default();

        for field in CORE_FIELDS {
            set.add_field(None, field.name, field.field_type, &disabled, || {
                FilterTarget::Core(field.name)
            });
        }

        for ns in &config.namespaces {
            for FieldDef {
                name, field_type, ..
            } in &ns.fields
            {
                set.add_field(Some(ns.name.as_str()), name, *field_type, &disabled, || {
                    FilterTarget::Namespace {
                        namespace: ns.name.clone(),
                        field: name.clone(),
                    }
                });
            }
        }

        set.params.insert(
            TAG_FILTER.to_string(),
            FilterParam {
                target: FilterTarget::Tag,
                field_type: FieldType::Text,
                lookup: Lookup::In,
            },
        );
        set.params.insert(
            SOURCE_PRODUCT_FILTER.to_string(),
            FilterParam {
                target: FilterTarget::SourceProduct,
                field_type: FieldType::Uuid,
                lookup: Lookup::Exact,
            },
        );
        set.params.insert(
            DERIVED_PRODUCT_FILTER.to_string(),
            FilterParam {
                target: FilterTarget::DerivedProduct,
                field_type: FieldType::Uuid,
                lookup: Lookup::Exact,
            },
        );

        set
    }

    fn add_field(
        &mut self,
        namespace: Option<&str>,
        field: &str,
        field_type: FieldType,
        disabled: &[Lookup],
        target: impl Fn() -> FilterTarget,
    ) {
        let base = match namespace {
            Some(ns) => format!("{ns}__{field}"),
            None => field.to_string(),
        };
        for lookup in field_type.lookups() {
            if disabled.contains(lookup) {
                continue;
            }
            let name = match lookup {
                Lookup::Exact => base.clone(),
                other => format!("{base}__{other}"),
            };
            self.params.insert(
                name,
                FilterParam {
                    target: target(),
                    field_type,
                    lookup: *lookup,
                },
            );
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Accepted parameter names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&FilterParam> {
        self.params.get(name)
    }

    /// Decode the filter parameters among `params`.
    ///
    /// Non-filter names are ignored here. Empty values are skipped; for a
    /// repeated name the last value wins.
    pub fn parse<'a, I>(&self, params: I) -> Result<Vec<Predicate>, CoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut values: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, value) in params {
            if self.params.contains_key(name) {
                values.insert(name, value);
            }
        }

        let mut errors = Vec::new();
        let mut predicates = Vec::new();
        for (name, raw) in values {
            if raw.is_empty() {
                continue;
            }
            let param = &self.params[name];
            match param.decode(raw) {
                Ok(operand) => predicates.push(Predicate {
                    target: param.target.clone(),
                    field_type: param.field_type,
                    lookup: param.lookup,
                    operand,
                }),
                Err(msg) => errors.push(format!("{name}: {msg}")),
            }
        }

        if errors.is_empty() {
            Ok(predicates)
        } else {
            Err(CoreError::Validation(errors.join("; ")))
        }
    }
}

impl FilterParam {
    fn decode(&self, raw: &str) -> Result<Operand, String> {
        let ty = self.field_type;
        match self.lookup {
            Lookup::In => raw
                .split(',')
                .map(|item| ty.parse_query(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Operand::List),
            Lookup::Range => {
                let parts: Vec<&str> = raw.split(',').collect();
                let [low, high] = parts.as_slice() else {
                    return Err("Range query expects two values.".into());
                };
                Ok(Operand::Range(ty.parse_query(low)?, ty.parse_query(high)?))
            }
            Lookup::Isnull => match raw.trim() {
                "true" | "True" | "1" => Ok(Operand::IsNull(true)),
                "false" | "False" | "0" => Ok(Operand::IsNull(false)),
                _ => Err("Select a valid choice.".into()),
            },
            Lookup::Year | Lookup::Month | Lookup::Day => raw
                .trim()
                .parse::<i32>()
                .map(Operand::Part)
                .map_err(|_| "Enter a whole number.".into()),
            Lookup::Date => datetime::parse_naive_date(raw)
                .map(Operand::Date)
                .ok_or_else(|| "Enter a valid date.".into()),
            // PostgreSQL compiles the pattern and rejects it with 2201B
            Lookup::Regex | Lookup::Iregex => Ok(Operand::Value(FieldValue::Text(raw.to_string()))),
            _ => ty.parse_query(raw).map(Operand::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NamespaceSchema;
    use assert_matches::assert_matches;

    fn config() -> ArchiveConfig {
        ArchiveConfig {
            namespaces: vec![NamespaceSchema {
                name: "mynamespace".into(),
                fields: vec![
                    FieldDef {
                        name: "counter".into(),
                        field_type: FieldType::Long,
                        optional: false,
                    },
                    FieldDef {
                        name: "area".into(),
                        field_type: FieldType::Geometry,
                        optional: true,
                    },
                ],
            }],
            disabled_lookups: vec!["regex".into(), "iregex".into()],
            ..Default::default()
        }
    }

    fn parse(set: &FilterSet, params: &[(&'static str, &'static str)]) -> Result<Vec<Predicate>, CoreError> {
        set.parse(params.iter().copied())
    }

    #[test]
    fn parameter_names() {
        let set = FilterSet::for_archive(&config());
        for name in [
            "product_type",
            "product_type__icontains",
            "validity_start__gte",
            "validity_start__year",
            "size__range",
            "uuid__in",
            "mynamespace__counter",
            "mynamespace__counter__lt",
            "tag",
            "source_product",
            "derived_product",
        ] {
            assert!(set.contains(name), "missing {name}");
        }
        assert!(!set.contains("product_type__exact"));
        assert!(!set.contains("size__icontains"));
    }

    #[test]
    fn disabled_lookups_are_absent() {
        let set = FilterSet::for_archive(&config());
        assert!(set.names().all(|n| !n.ends_with("__regex") && !n.ends_with("__iregex")));
    }

    #[test]
    fn geometry_is_never_filterable() {
        let set = FilterSet::for_archive(&config());
        assert!(set.names().all(|n| !n.starts_with("footprint")));
        assert!(set.names().all(|n| !n.starts_with("mynamespace__area")));
    }

    #[test]
    fn parses_typed_values() {
        let set = FilterSet::for_archive(&config());
        let preds = parse(
            &set,
            &[
                ("size__gt", "10"),
                ("product_type", "TYPE"),
                ("mynamespace__counter__in", "1,2,3"),
                ("validity_start__range", "2020-01-01,20200201T000000"),
                ("archive_path__isnull", "true"),
                ("tag", "a,b"),
            ],
        )
        .unwrap();
        assert_eq!(preds.len(), 6);

        let counter = preds
            .iter()
            .find(|p| matches!(&p.target, FilterTarget::Namespace { field, .. } if field == "counter"))
            .unwrap();
        assert_eq!(
            counter.operand,
            Operand::List(vec![
                FieldValue::Long(1),
                FieldValue::Long(2),
                FieldValue::Long(3)
            ])
        );

        let tag = preds.iter().find(|p| p.target == FilterTarget::Tag).unwrap();
        assert_eq!(
            tag.operand,
            Operand::List(vec![FieldValue::Text("a".into()), FieldValue::Text("b".into())])
        );

        let isnull = preds.iter().find(|p| p.lookup == Lookup::Isnull).unwrap();
        assert_eq!(isnull.operand, Operand::IsNull(true));
    }

    #[test]
    fn empty_values_are_skipped() {
        let set = FilterSet::for_archive(&config());
        assert!(parse(&set, &[("size", ""), ("tag", "")]).unwrap().is_empty());
    }

    #[test]
    fn last_value_wins() {
        let set = FilterSet::for_archive(&config());
        let preds = parse(&set, &[("size", "1"), ("size", "2")]).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].operand, Operand::Value(FieldValue::Long(2)));
    }

    #[test]
    fn bad_values_are_validation_errors() {
        let set = FilterSet::for_archive(&config());
        assert_matches!(
            parse(&set, &[("size", "big")]),
            Err(CoreError::Validation(msg)) if msg.starts_with("size:")
        );
        assert_matches!(
            parse(&set, &[("validity_start", "not-a-date")]),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            parse(&set, &[("size__range", "1")]),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            parse(&set, &[("source_product", "nope")]),
            Err(CoreError::Validation(_))
        );
    }
}
