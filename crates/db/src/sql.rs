//! Dynamic SQL for archive tables.
//!
//! Table and column names come from the validated archive configuration;
//! every value is sent as a bind parameter. Statements are assembled as
//! text with `$n` placeholders while the typed values are collected in
//! [`Binds`], then bound in order once the text is complete.

use chrono::NaiveDate;
use muninn_core::field::{FieldType, FieldValue, Lookup};
use muninn_core::filter::{FilterTarget, Operand, Predicate};
use muninn_core::ordering::{OrderColumn, OrderTerm};
use muninn_core::registry::Archive;
use muninn_core::schema::{CoreField, CORE_FIELDS, PRIMARY_KEY};
use muninn_core::types::Timestamp;
use sqlx::postgres::PgArguments;
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::types::Json;
use sqlx::Postgres;
use uuid::Uuid;

/// Alias of the core table in listing queries.
pub const CORE_ALIAS: &str = "c";

/// Typed value of a dynamically built statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Field(FieldValue),
    Date(NaiveDate),
    BigInt(i64),
    Int(i32),
}

/// Bind values collected while a statement is assembled.
#[derive(Debug, Default)]
pub struct Binds {
    values: Vec<BindValue>,
}

impl Binds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value and return its placeholder.
    pub fn push(&mut self, value: BindValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    /// Placeholder expression for a column value. Geometries on spatial
    /// archives are converted from GeoJSON by PostGIS.
    pub fn value(&mut self, value: &FieldValue, spatial: bool) -> String {
        match value {
            FieldValue::Geometry(geojson) if spatial => {
                let p = self.push(BindValue::Field(FieldValue::Text(geojson.to_string())));
                format!("ST_GeomFromGeoJSON({p})::geography")
            }
            FieldValue::Null(FieldType::Geometry) => "NULL".to_string(),
            other => self.push(BindValue::Field(other.clone())),
        }
    }

    pub fn values(&self) -> &[BindValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Quote a configured identifier.
pub fn ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn qualified(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{alias}.{}", ident(column)),
        None => ident(column),
    }
}

/// Select expression of one column; geometries are read back as GeoJSON.
pub fn column_expr(alias: Option<&str>, name: &str, field_type: FieldType, spatial: bool) -> String {
    let column = qualified(alias, name);
    if field_type == FieldType::Geometry && spatial {
        format!("ST_AsGeoJSON({column})::jsonb AS {}", ident(name))
    } else if alias.is_some() {
        format!("{column} AS {}", ident(name))
    } else {
        column
    }
}

/// Select list of the core table.
pub fn core_columns(alias: Option<&str>, spatial: bool) -> String {
    CORE_FIELDS
        .iter()
        .map(|f: &CoreField| column_expr(alias, f.name, f.field_type, spatial))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Alias of a joined namespace table.
pub fn namespace_alias(namespace: &str) -> String {
    format!("n_{namespace}")
}

/// `LEFT JOIN`s for every namespace referenced by the predicates or ordering.
pub fn joins(archive: &Archive, predicates: &[Predicate], ordering: &[OrderTerm]) -> String {
    let mut namespaces: Vec<&str> = Vec::new();
    let referenced = predicates
        .iter()
        .filter_map(|p| match &p.target {
            FilterTarget::Namespace { namespace, .. } => Some(namespace.as_str()),
            _ => None,
        })
        .chain(ordering.iter().filter_map(|t| match &t.column {
            OrderColumn::Namespace { namespace, .. } => Some(namespace.as_str()),
            OrderColumn::Core(_) => None,
        }));
    for ns in referenced {
        if !namespaces.contains(&ns) {
            namespaces.push(ns);
        }
    }

    namespaces
        .into_iter()
        .map(|ns| {
            let alias = namespace_alias(ns);
            format!(
                " LEFT JOIN {table} {alias} ON {alias}.{pk} = {CORE_ALIAS}.{pk}",
                table = archive.tables().namespace(ns),
                pk = PRIMARY_KEY,
            )
        })
        .collect()
}

/// `WHERE` clause for the predicates, empty when there are none.
pub fn where_clause(archive: &Archive, predicates: &[Predicate], binds: &mut Binds) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = predicates
        .iter()
        .map(|p| predicate_sql(archive, p, binds))
        .collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

fn predicate_sql(archive: &Archive, predicate: &Predicate, binds: &mut Binds) -> String {
    let tables = archive.tables();
    let c = CORE_ALIAS;
    match &predicate.target {
        FilterTarget::Tag => {
            let Operand::List(tags) = &predicate.operand else {
                return "FALSE".into();
            };
            let placeholders = list_placeholders(tags, binds);
            format!(
                "EXISTS (SELECT 1 FROM {} t WHERE t.uuid = {c}.uuid AND t.tag IN ({placeholders}))",
                tables.tag()
            )
        }
        FilterTarget::SourceProduct => {
            let p = operand_value(&predicate.operand, binds);
            format!(
                "EXISTS (SELECT 1 FROM {} l WHERE l.uuid = {c}.uuid AND l.source_uuid = {p})",
                tables.link()
            )
        }
        FilterTarget::DerivedProduct => {
            let p = operand_value(&predicate.operand, binds);
            format!(
                "EXISTS (SELECT 1 FROM {} l WHERE l.source_uuid = {c}.uuid AND l.uuid = {p})",
                tables.link()
            )
        }
        FilterTarget::Core(field) => lookup_sql(&qualified(Some(c), field), predicate, binds),
        FilterTarget::Namespace { namespace, field } => lookup_sql(
            &qualified(Some(&namespace_alias(namespace)), field),
            predicate,
            binds,
        ),
    }
}

fn lookup_sql(lhs: &str, predicate: &Predicate, binds: &mut Binds) -> String {
    let operand = &predicate.operand;
    match (predicate.lookup, operand) {
        (Lookup::Isnull, Operand::IsNull(true)) => format!("{lhs} IS NULL"),
        (Lookup::Isnull, _) => format!("{lhs} IS NOT NULL"),
        (Lookup::In, Operand::List(values)) => {
            format!("{lhs} IN ({})", list_placeholders(values, binds))
        }
        (Lookup::Range, Operand::Range(low, high)) => {
            let low = binds.push(BindValue::Field(low.clone()));
            let high = binds.push(BindValue::Field(high.clone()));
            format!("{lhs} BETWEEN {low} AND {high}")
        }
        (Lookup::Year | Lookup::Month | Lookup::Day, Operand::Part(n)) => {
            let part = match predicate.lookup {
                Lookup::Year => "YEAR",
                Lookup::Month => "MONTH",
                _ => "DAY",
            };
            let p = binds.push(BindValue::Int(*n));
            format!("EXTRACT({part} FROM {lhs}) = {p}")
        }
        (Lookup::Date, Operand::Date(date)) => {
            let p = binds.push(BindValue::Date(*date));
            format!("{lhs}::date = {p}")
        }
        (lookup, Operand::Value(value)) => {
            let text = match value {
                FieldValue::Text(s) => s.as_str(),
                _ => "",
            };
            match lookup {
                Lookup::Iexact => like(lhs, "ILIKE", escape_like(text), binds),
                Lookup::Contains => like(lhs, "LIKE", format!("%{}%", escape_like(text)), binds),
                Lookup::Icontains => like(lhs, "ILIKE", format!("%{}%", escape_like(text)), binds),
                Lookup::Startswith => like(lhs, "LIKE", format!("{}%", escape_like(text)), binds),
                Lookup::Istartswith => {
                    like(lhs, "ILIKE", format!("{}%", escape_like(text)), binds)
                }
                Lookup::Endswith => like(lhs, "LIKE", format!("%{}", escape_like(text)), binds),
                Lookup::Iendswith => like(lhs, "ILIKE", format!("%{}", escape_like(text)), binds),
                Lookup::Regex => format!("{lhs} ~ {}", binds.push(BindValue::Field(value.clone()))),
                Lookup::Iregex => {
                    format!("{lhs} ~* {}", binds.push(BindValue::Field(value.clone())))
                }
                other => {
                    let op = match other {
                        Lookup::Ne => "<>",
                        Lookup::Gt => ">",
                        Lookup::Gte => ">=",
                        Lookup::Lt => "<",
                        Lookup::Lte => "<=",
                        _ => "=",
                    };
                    format!("{lhs} {op} {}", binds.push(BindValue::Field(value.clone())))
                }
            }
        }
        // operand shapes are fixed by the lookup when the filter is parsed
        _ => "FALSE".into(),
    }
}

fn like(lhs: &str, op: &str, pattern: String, binds: &mut Binds) -> String {
    let p = binds.push(BindValue::Field(FieldValue::Text(pattern)));
    format!("{lhs} {op} {p}")
}

/// Escape `LIKE` wildcards (backslash is the default escape character).
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn list_placeholders(values: &[FieldValue], binds: &mut Binds) -> String {
    values
        .iter()
        .map(|v| binds.push(BindValue::Field(v.clone())))
        .collect::<Vec<_>>()
        .join(", ")
}

fn operand_value(operand: &Operand, binds: &mut Binds) -> String {
    match operand {
        Operand::Value(v) => binds.push(BindValue::Field(v.clone())),
        _ => "NULL".into(),
    }
}

/// `ORDER BY` clause; the primary key always breaks ties.
pub fn order_by(ordering: &[OrderTerm]) -> String {
    let mut terms: Vec<String> = ordering
        .iter()
        .map(|term| {
            let column = match &term.column {
                OrderColumn::Core(field) => qualified(Some(CORE_ALIAS), field),
                OrderColumn::Namespace { namespace, field } => {
                    qualified(Some(&namespace_alias(namespace)), field)
                }
            };
            let direction = if term.descending { "DESC" } else { "ASC" };
            format!("{column} {direction}")
        })
        .collect();
    terms.push(format!("{CORE_ALIAS}.{PRIMARY_KEY} ASC"));
    format!(" ORDER BY {}", terms.join(", "))
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Statement types that accept positional binds.
pub trait Bind<'q>: Sized {
    fn bind_one<T>(self, value: T) -> Self
    where
        T: 'q + sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres>;

    /// Bind every collected value, in placeholder order.
    fn bind_all(self, binds: &'q Binds) -> Self {
        binds.values().iter().fold(self, |q, value| bind_value(q, value))
    }
}

impl<'q> Bind<'q> for Query<'q, Postgres, PgArguments> {
    fn bind_one<T>(self, value: T) -> Self
    where
        T: 'q + sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres>,
    {
        self.bind(value)
    }
}

impl<'q, O> Bind<'q> for QueryAs<'q, Postgres, O, PgArguments> {
    fn bind_one<T>(self, value: T) -> Self
    where
        T: 'q + sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres>,
    {
        self.bind(value)
    }
}

impl<'q, O> Bind<'q> for QueryScalar<'q, Postgres, O, PgArguments> {
    fn bind_one<T>(self, value: T) -> Self
    where
        T: 'q + sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres>,
    {
        self.bind(value)
    }
}

fn bind_value<'q, Q: Bind<'q>>(q: Q, value: &'q BindValue) -> Q {
    match value {
        BindValue::Date(d) => q.bind_one(*d),
        BindValue::BigInt(v) => q.bind_one(*v),
        BindValue::Int(v) => q.bind_one(*v),
        BindValue::Field(field) => match field {
            FieldValue::Long(v) => q.bind_one(*v),
            FieldValue::Integer(v) => q.bind_one(*v),
            FieldValue::Real(v) => q.bind_one(*v),
            FieldValue::Boolean(v) => q.bind_one(*v),
            FieldValue::Text(v) => q.bind_one(v.as_str()),
            FieldValue::Timestamp(v) => q.bind_one(*v),
            FieldValue::Uuid(v) => q.bind_one(*v),
            FieldValue::Geometry(v) => q.bind_one(Json(v)),
            FieldValue::Null(ty) => match ty {
                FieldType::Long => q.bind_one(None::<i64>),
                FieldType::Integer => q.bind_one(None::<i32>),
                FieldType::Real => q.bind_one(None::<f64>),
                FieldType::Boolean => q.bind_one(None::<bool>),
                FieldType::Text => q.bind_one(None::<String>),
                FieldType::Timestamp => q.bind_one(None::<Timestamp>),
                FieldType::Uuid => q.bind_one(None::<Uuid>),
                FieldType::Geometry => q.bind_one(None::<Json<serde_json::Value>>),
            },
        },
    }
}
