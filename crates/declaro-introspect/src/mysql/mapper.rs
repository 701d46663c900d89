use std::collections::BTreeMap;

use regex::Regex;

use declaro_core::{
    Column, ColumnDefault, FkAction, Flavor, ForeignKey, GeneratedColumn, Index, IndexPart,
    Routine, RoutineKind, Table, TableOptions, TypeFamily,
};

use super::queries::{
    RawColumn, RawForeignKeyPart, RawIndexPart, RawParameter, RawRoutine, RawTable,
};
use crate::options::IntrospectOptions;

pub fn map_table(raw: RawTable, opts: &IntrospectOptions) -> Table {
    let collation = raw.collation.unwrap_or_default();
    let charset = charset_of_collation(&collation);
    let (row_format, create_options) = split_create_options(raw.create_options.as_deref());

    let mut table = Table::new(raw.name);
    table.options = TableOptions {
        engine: raw.engine.unwrap_or_default(),
        charset,
        collation,
        row_format,
        comment: raw
            .comment
            .filter(|comment| opts.include_comments && !comment.is_empty()),
        create_options,
    };
    table.auto_increment = raw.auto_increment.and_then(|value| u64::try_from(value).ok());
    table
}

/// `utf8mb4_0900_ai_ci` -> `utf8mb4`; `binary` stays `binary`.
pub fn charset_of_collation(collation: &str) -> String {
    collation
        .split('_')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Splits `information_schema.tables.create_options` into an explicit row
/// format and the remaining options, sorted.
pub fn split_create_options(raw: Option<&str>) -> (Option<String>, Vec<String>) {
    let mut row_format = None;
    let mut rest = Vec::new();
    for option in raw.unwrap_or_default().split_whitespace() {
        let lower = option.to_ascii_lowercase();
        if let Some(format) = lower.strip_prefix("row_format=") {
            row_format = Some(format.to_ascii_uppercase());
        } else if lower != "partitioned" {
            rest.push(lower);
        }
    }
    rest.sort();
    (row_format, rest)
}

/// Groups columns by table, preserving ordinal order.
pub fn map_columns(
    raw: Vec<RawColumn>,
    flavor: &Flavor,
    opts: &IntrospectOptions,
) -> BTreeMap<String, Vec<Column>> {
    let mut by_table: BTreeMap<String, Vec<Column>> = BTreeMap::new();
    for col in raw {
        let extra = col.extra.to_ascii_lowercase();
        let nullable = col.is_nullable.eq_ignore_ascii_case("YES");
        let generated = col
            .generation_expression
            .filter(|expr| !expr.is_empty())
            .map(|expression| GeneratedColumn {
                expression,
                stored: extra.contains("stored") || extra.contains("persistent"),
            });
        let default = if generated.is_some() {
            None
        } else {
            map_default(col.default.as_deref(), &extra, &col.column_type, nullable, flavor)
        };

        let column = Column {
            name: col.name,
            type_name: col.column_type,
            nullable,
            default,
            auto_increment: extra.contains("auto_increment"),
            on_update: on_update_of(&col.extra),
            charset: col.charset,
            collation: col.collation,
            comment: Some(col.comment).filter(|c| opts.include_comments && !c.is_empty()),
            generated,
            invisible: extra.contains("invisible"),
        };
        by_table.entry(col.table).or_default().push(column);
    }
    by_table
}

/// Interprets `information_schema.columns.column_default`, whose encoding
/// differs between flavors.
pub fn map_default(
    raw: Option<&str>,
    extra: &str,
    column_type: &str,
    nullable: bool,
    flavor: &Flavor,
) -> Option<ColumnDefault> {
    if flavor.quotes_column_defaults() {
        return match raw {
            None => None,
            Some("NULL") => Some(ColumnDefault::Null),
            Some(value) if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') => {
                Some(ColumnDefault::Literal(unquote(value)))
            }
            Some(value) if is_numeric_literal(value) => Some(ColumnDefault::Literal(value.to_string())),
            Some(value) => Some(ColumnDefault::Expression(value.to_string())),
        };
    }

    let Some(value) = raw else {
        return nullable.then_some(ColumnDefault::Null);
    };
    let lower_extra = extra.to_ascii_lowercase();
    if lower_extra.contains("default_generated") || is_current_timestamp(value, column_type) {
        return Some(ColumnDefault::Expression(value.to_string()));
    }
    Some(ColumnDefault::Literal(value.to_string()))
}

fn is_current_timestamp(value: &str, column_type: &str) -> bool {
    let family = declaro_core::ColumnType::parse(column_type).family();
    family == TypeFamily::Temporal && value.to_ascii_lowercase().starts_with("current_timestamp")
}

fn is_numeric_literal(value: &str) -> bool {
    !value.is_empty() && value.parse::<f64>().is_ok()
}

fn unquote(value: &str) -> String {
    value[1..value.len() - 1].replace("''", "'").replace("\\\\", "\\")
}

/// Extracts `CURRENT_TIMESTAMP[(n)]` from an extra column such as
/// `DEFAULT_GENERATED on update CURRENT_TIMESTAMP(3)`.
pub fn on_update_of(extra: &str) -> Option<String> {
    let lower = extra.to_ascii_lowercase();
    let start = lower.find("on update ")? + "on update ".len();
    let rest = &extra[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(rest[..end].to_string()).filter(|value| !value.is_empty())
}

/// Groups index parts into indexes per table. The primary key is placed
/// first; other indexes keep the order in which they appear in
/// `create_statements`, falling back to name order.
pub fn map_indexes(
    raw: Vec<RawIndexPart>,
    create_statements: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<Index>> {
    let mut grouped: BTreeMap<String, Vec<Index>> = BTreeMap::new();
    for part in raw {
        let indexes = grouped.entry(part.table.clone()).or_default();
        let position = match indexes.iter().position(|idx| idx.name == part.index) {
            Some(position) => position,
            None => {
                let primary = part.index == "PRIMARY";
                indexes.push(Index {
                    name: part.index.clone(),
                    parts: Vec::new(),
                    primary,
                    unique: !part.non_unique,
                    index_type: part.index_type.clone(),
                    comment: Some(part.comment.clone()).filter(|c| !c.is_empty()),
                    invisible: !part.visible,
                });
                indexes.len() - 1
            }
        };
        indexes[position].parts.push(IndexPart {
            column: part.column,
            expression: part.expression.filter(|expr| !expr.is_empty()),
            sub_part: part.sub_part.and_then(|len| u32::try_from(len).ok()),
            descending: part.descending,
        });
    }

    for (table, indexes) in &mut grouped {
        let create = create_statements.get(table).map(String::as_str).unwrap_or_default();
        indexes.sort_by_key(|idx| (!idx.primary, declaration_position(create, &idx.name)));
    }
    grouped
}

fn declaration_position(create: &str, index: &str) -> usize {
    let needle = format!("KEY `{}`", index.replace('`', "``"));
    create.find(&needle).unwrap_or(usize::MAX)
}

pub fn map_foreign_keys(
    raw: Vec<RawForeignKeyPart>,
    schema: &str,
) -> BTreeMap<String, Vec<ForeignKey>> {
    let mut grouped: BTreeMap<String, Vec<ForeignKey>> = BTreeMap::new();
    for part in raw {
        let fks = grouped.entry(part.table.clone()).or_default();
        match fks.iter_mut().find(|fk| fk.name == part.name) {
            Some(fk) => {
                fk.columns.push(part.column);
                fk.referenced_columns.push(part.referenced_column);
            }
            None => fks.push(ForeignKey {
                name: part.name,
                columns: vec![part.column],
                referenced_schema: (part.referenced_schema != schema)
                    .then_some(part.referenced_schema),
                referenced_table: part.referenced_table,
                referenced_columns: vec![part.referenced_column],
                on_update: FkAction::from_rule(&part.update_rule),
                on_delete: FkAction::from_rule(&part.delete_rule),
            }),
        }
    }
    for fks in grouped.values_mut() {
        fks.sort_by(|left, right| left.name.cmp(&right.name));
    }
    grouped
}

/// Renders the parameter list of each routine keyed by `(type, name)`.
pub fn map_parameters(raw: Vec<RawParameter>) -> BTreeMap<(String, String), String> {
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for param in raw {
        let mut rendered = String::new();
        if let Some(mode) = param.mode.filter(|_| param.routine_type.eq_ignore_ascii_case("PROCEDURE")) {
            rendered.push_str(&mode);
            rendered.push(' ');
        }
        if let Some(name) = param.name {
            rendered.push_str(&name);
            rendered.push(' ');
        }
        rendered.push_str(&param.dtd_identifier);
        grouped
            .entry((param.routine_type.to_ascii_uppercase(), param.routine))
            .or_default()
            .push(rendered);
    }
    grouped
        .into_iter()
        .map(|(key, params)| (key, params.join(", ")))
        .collect()
}

pub fn map_routine(raw: RawRoutine, params: String, create_statement: Option<String>) -> Option<Routine> {
    let kind = match raw.routine_type.to_ascii_uppercase().as_str() {
        "PROCEDURE" => RoutineKind::Procedure,
        "FUNCTION" => RoutineKind::Function,
        _ => return None,
    };
    Some(Routine {
        name: raw.name,
        kind,
        params,
        returns: raw.returns.filter(|_| kind == RoutineKind::Function),
        body: raw.body.unwrap_or_default(),
        deterministic: raw.deterministic.eq_ignore_ascii_case("YES"),
        data_access: raw.data_access,
        security: raw.security,
        comment: raw.comment,
        sql_mode: raw.sql_mode,
        create_statement: create_statement.unwrap_or_default(),
        origin: None,
    })
}

/// Removes the ` AUTO_INCREMENT=n` table option from `SHOW CREATE TABLE`
/// output; the counter is server metadata.
pub fn strip_auto_increment(create: &str) -> String {
    match Regex::new(r" AUTO_INCREMENT=\d+") {
        Ok(pattern) => pattern.replace(create, "").into_owned(),
        Err(_) => create.to_string(),
    }
}
