//! Table generation for an archive.

use crate::config::ArchiveConfig;
use crate::schema::{ArchiveTables, NamespaceSchema, CORE_FIELDS, PRIMARY_KEY};

/// `CREATE` statements for every table of the archive, in dependency order.
///
/// All statements are idempotent.
pub fn archive_ddl(config: &ArchiveConfig) -> Vec<String> {
    let tables = ArchiveTables::new(&config.table_prefix);
    let mut statements = Vec::new();

    if config.spatial {
        statements.push("CREATE EXTENSION IF NOT EXISTS postgis".to_string());
    }

    statements.push(core_table(&tables, config.spatial));
    statements.push(tag_table(&tables));
    statements.push(link_table(&tables));
    for ns in &config.namespaces {
        statements.push(namespace_table(&tables, ns, config.spatial));
    }

    statements
}

/// All statements joined as one SQL script.
pub fn archive_script(config: &ArchiveConfig) -> String {
    archive_ddl(config)
        .into_iter()
        .map(|s| format!("{s};\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn core_table(tables: &ArchiveTables, spatial: bool) -> String {
    let columns: Vec<String> = CORE_FIELDS
        .iter()
        .map(|f| {
            if f.name == PRIMARY_KEY {
                format!("    {} uuid PRIMARY KEY", f.name)
            } else {
                column(f.name, f.field_type.sql_type(spatial), f.optional)
            }
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {core} (\n{columns},\n    \
         CONSTRAINT \"{raw}_type_name_key\" UNIQUE (product_type, product_name),\n    \
         CONSTRAINT \"{raw}_path_name_key\" UNIQUE (archive_path, physical_name)\n)",
        core = tables.core(),
        raw = tables.raw("core"),
        columns = columns.join(",\n"),
    )
}

fn tag_table(tables: &ArchiveTables) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {tag} (\n    \
         id bigserial PRIMARY KEY,\n    \
         uuid uuid NOT NULL REFERENCES {core} (uuid) ON DELETE CASCADE,\n    \
         tag text NOT NULL,\n    \
         CONSTRAINT \"{raw}_uuid_tag_key\" UNIQUE (uuid, tag)\n)",
        tag = tables.tag(),
        core = tables.core(),
        raw = tables.raw("tag"),
    )
}

fn link_table(tables: &ArchiveTables) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {link} (\n    \
         id bigserial PRIMARY KEY,\n    \
         uuid uuid NOT NULL REFERENCES {core} (uuid) ON DELETE CASCADE,\n    \
         source_uuid uuid NOT NULL REFERENCES {core} (uuid) ON DELETE CASCADE,\n    \
         CONSTRAINT \"{raw}_uuid_source_uuid_key\" UNIQUE (uuid, source_uuid)\n)",
        link = tables.link(),
        core = tables.core(),
        raw = tables.raw("link"),
    )
}

fn namespace_table(tables: &ArchiveTables, ns: &NamespaceSchema, spatial: bool) -> String {
    let mut columns = vec![format!(
        "    uuid uuid PRIMARY KEY REFERENCES {} (uuid) ON DELETE CASCADE",
        tables.core()
    )];
    columns.extend(
        ns.fields
            .iter()
            .map(|f| column(&f.name, f.field_type.sql_type(spatial), f.optional)),
    );

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        tables.namespace(&ns.name),
        columns.join(",\n")
    )
}

fn column(name: &str, sql_type: &str, optional: bool) -> String {
    if optional {
        format!("    \"{name}\" {sql_type}")
    } else {
        format!("    \"{name}\" {sql_type} NOT NULL")
    }
}
