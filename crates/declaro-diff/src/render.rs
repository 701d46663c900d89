//! DDL text for structural objects.
//!
//! Tables and routines carry the server's own `SHOW CREATE` text, which is
//! preferred. The generated forms are used when that text is unavailable.

use std::collections::BTreeSet;

use declaro_core::{
    quote_identifier, quote_literal, Column, ColumnDefault, ForeignKey, Index, IndexPart, Routine,
    RoutineKind, Table,
};

pub fn column_definition(column: &Column) -> String {
    let mut sql = format!("{} {}", quote_identifier(&column.name), column.type_name);
    if let Some(collation) = &column.collation {
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" CHARACTER SET {charset}"));
        }
        sql.push_str(&format!(" COLLATE {collation}"));
    }
    if let Some(generated) = &column.generated {
        let storage = if generated.stored { "STORED" } else { "VIRTUAL" };
        sql.push_str(&format!(" GENERATED ALWAYS AS ({}) {storage}", generated.expression));
    }
    sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if column.generated.is_none() {
        match &column.default {
            Some(ColumnDefault::Null) if column.nullable => sql.push_str(" DEFAULT NULL"),
            Some(ColumnDefault::Literal(value)) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(&literal_default(value));
            }
            Some(ColumnDefault::Expression(expr)) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(&expression_default(expr));
            }
            _ => {}
        }
    }
    if let Some(on_update) = &column.on_update {
        sql.push_str(&format!(" ON UPDATE {on_update}"));
    }
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if column.invisible {
        sql.push_str(" INVISIBLE");
    }
    if let Some(comment) = &column.comment {
        sql.push_str(&format!(" COMMENT {}", quote_literal(comment)));
    }
    sql
}

fn literal_default(value: &str) -> String {
    let is_bit_or_hex = (value.starts_with("b'") || value.starts_with("0x")) && !value.contains(' ');
    if is_bit_or_hex {
        value.to_string()
    } else {
        quote_literal(value)
    }
}

/// Temporal functions are written bare; any other expression default needs
/// parentheses.
fn expression_default(expr: &str) -> String {
    let upper = expr.trim().to_ascii_uppercase();
    let bare = ["CURRENT_TIMESTAMP", "NOW(", "LOCALTIME", "CURRENT_DATE", "CURRENT_TIME"];
    if expr.starts_with('(') || bare.iter().any(|prefix| upper.starts_with(prefix)) {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

fn index_part(part: &IndexPart) -> String {
    let mut sql = match (&part.column, &part.expression) {
        (Some(column), _) => quote_identifier(column),
        (None, Some(expr)) => format!("({expr})"),
        (None, None) => String::new(),
    };
    if let Some(length) = part.sub_part {
        sql.push_str(&format!("({length})"));
    }
    if part.descending {
        sql.push_str(" DESC");
    }
    sql
}

pub fn index_definition(index: &Index) -> String {
    let parts: Vec<String> = index.parts.iter().map(index_part).collect();
    let name = quote_identifier(&index.name);
    let head = if index.primary {
        "PRIMARY KEY".to_string()
    } else if index.unique {
        format!("UNIQUE KEY {name}")
    } else {
        match index.index_type.to_ascii_uppercase().as_str() {
            "FULLTEXT" => format!("FULLTEXT KEY {name}"),
            "SPATIAL" => format!("SPATIAL KEY {name}"),
            _ => format!("KEY {name}"),
        }
    };
    let mut sql = format!("{head} ({})", parts.join(","));
    if index.index_type.eq_ignore_ascii_case("HASH") {
        sql.push_str(" USING HASH");
    }
    if let Some(comment) = &index.comment {
        sql.push_str(&format!(" COMMENT {}", quote_literal(comment)));
    }
    if index.invisible {
        sql.push_str(" INVISIBLE");
    }
    sql
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn foreign_key_definition(fk: &ForeignKey) -> String {
    let target = match &fk.referenced_schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&fk.referenced_table)),
        None => quote_identifier(&fk.referenced_table),
    };
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {target} ({}) ON DELETE {} ON UPDATE {}",
        quote_identifier(&fk.name),
        column_list(&fk.columns),
        column_list(&fk.referenced_columns),
        fk.on_delete,
        fk.on_update
    )
}

/// `CREATE TABLE` for `table`, leaving out the named foreign keys.
pub fn create_table(table: &Table, omit_foreign_keys: &BTreeSet<String>) -> String {
    if table.create_statement.trim().is_empty() {
        generate_create_table(table, omit_foreign_keys)
    } else if omit_foreign_keys.is_empty() {
        table.create_statement.clone()
    } else {
        strip_foreign_keys(&table.create_statement, omit_foreign_keys)
    }
}

fn generate_create_table(table: &Table, omit_foreign_keys: &BTreeSet<String>) -> String {
    let mut definitions: Vec<String> = table.columns.iter().map(column_definition).collect();
    definitions.extend(table.indexes.iter().map(index_definition));
    definitions.extend(
        table
            .foreign_keys
            .iter()
            .filter(|fk| !omit_foreign_keys.contains(&fk.name))
            .map(foreign_key_definition),
    );

    let options = &table.options;
    let mut sql = format!(
        "CREATE TABLE {} (\n  {}\n) ENGINE={} DEFAULT CHARSET={} COLLATE={}",
        quote_identifier(&table.name),
        definitions.join(",\n  "),
        options.engine,
        options.charset,
        options.collation
    );
    if let Some(row_format) = &options.row_format {
        sql.push_str(&format!(" ROW_FORMAT={}", row_format.to_ascii_uppercase()));
    }
    for option in options.create_options.iter().filter(|option| option.contains('=')) {
        sql.push(' ');
        sql.push_str(&option.to_ascii_uppercase());
    }
    if let Some(comment) = &options.comment {
        sql.push_str(&format!(" COMMENT={}", quote_literal(comment)));
    }
    sql
}

/// Removes `CONSTRAINT ... FOREIGN KEY` lines from server-rendered create text.
pub fn strip_foreign_keys(create: &str, names: &BTreeSet<String>) -> String {
    let prefixes: Vec<String> = names
        .iter()
        .map(|name| format!("CONSTRAINT {} FOREIGN KEY", quote_identifier(name)))
        .collect();
    let mut lines: Vec<String> = create
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !prefixes.iter().any(|prefix| trimmed.starts_with(prefix.as_str()))
        })
        .map(str::to_string)
        .collect();

    if let Some(close) = lines.iter().rposition(|line| line.starts_with(')')) {
        if close > 0 {
            let last = &mut lines[close - 1];
            if last.ends_with(',') {
                last.pop();
            }
        }
    }
    lines.join("\n")
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE {}", quote_identifier(name))
}

pub fn drop_routine(routine: &Routine) -> String {
    format!(
        "DROP {} {}",
        routine.kind.object_kind().keyword(),
        quote_identifier(&routine.name)
    )
}

pub fn create_routine(routine: &Routine) -> String {
    if !routine.create_statement.trim().is_empty() {
        return routine.create_statement.clone();
    }
    let mut sql = format!(
        "CREATE {} {}({})",
        routine.kind.object_kind().keyword(),
        quote_identifier(&routine.name),
        routine.params
    );
    if routine.kind == RoutineKind::Function {
        if let Some(returns) = &routine.returns {
            sql.push_str(&format!(" RETURNS {returns}"));
        }
    }
    if !routine.comment.is_empty() {
        sql.push_str(&format!("\n    COMMENT {}", quote_literal(&routine.comment)));
    }
    if routine.deterministic {
        sql.push_str("\n    DETERMINISTIC");
    }
    if !routine.data_access.is_empty() {
        sql.push_str(&format!("\n    {}", routine.data_access));
    }
    if !routine.security.is_empty() {
        sql.push_str(&format!("\n    SQL SECURITY {}", routine.security));
    }
    sql.push('\n');
    sql.push_str(&routine.body);
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use declaro_core::FkAction;

    #[test]
    fn column_definitions_cover_defaults() {
        let mut created = Column::new("created_at", "timestamp").not_null();
        created.default = Some(ColumnDefault::Expression("CURRENT_TIMESTAMP".to_string()));
        created.on_update = Some("CURRENT_TIMESTAMP".to_string());
        assert_eq!(
            column_definition(&created),
            "`created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );

        let mut token = Column::new("token", "varchar(36)");
        token.default = Some(ColumnDefault::Expression("uuid()".to_string()));
        token.collation = Some("utf8mb4_bin".to_string());
        token.charset = Some("utf8mb4".to_string());
        assert_eq!(
            column_definition(&token),
            "`token` varchar(36) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NULL DEFAULT (uuid())"
        );

        let mut status = Column::new("status", "varchar(8)").not_null();
        status.default = Some(ColumnDefault::Literal("it's".to_string()));
        assert_eq!(column_definition(&status), "`status` varchar(8) NOT NULL DEFAULT 'it''s'");
    }

    #[test]
    fn index_and_foreign_key_definitions() {
        let mut idx = Index::new("idx_name", &["last", "first"]);
        idx.parts[0].sub_part = Some(10);
        idx.parts[1].descending = true;
        assert_eq!(index_definition(&idx), "KEY `idx_name` (`last`(10),`first` DESC)");
        assert_eq!(index_definition(&Index::primary_key(&["id"])), "PRIMARY KEY (`id`)");

        let mut fk = ForeignKey::new("fk_user", &["user_id"], "users", &["id"]);
        fk.on_delete = FkAction::Cascade;
        assert_eq!(
            foreign_key_definition(&fk),
            "CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE ON UPDATE RESTRICT"
        );
    }

    #[test]
    fn stripping_foreign_keys_fixes_trailing_comma() {
        let create = "CREATE TABLE `a` (\n  `id` int NOT NULL,\n  `b_id` int DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  KEY `fk_b` (`b_id`),\n  CONSTRAINT `fk_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)\n) ENGINE=InnoDB";
        let names = BTreeSet::from(["fk_b".to_string()]);
        assert_eq!(
            strip_foreign_keys(create, &names),
            "CREATE TABLE `a` (\n  `id` int NOT NULL,\n  `b_id` int DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  KEY `fk_b` (`b_id`)\n) ENGINE=InnoDB"
        );
    }

    #[test]
    fn generated_create_table_omits_deferred_keys() {
        let mut table = Table::new("a");
        table.columns.push(Column::new("id", "int").not_null());
        table.columns.push(Column::new("b_id", "int"));
        table.indexes.push(Index::primary_key(&["id"]));
        table
            .foreign_keys
            .push(ForeignKey::new("fk_b", &["b_id"], "b", &["id"]));

        let full = create_table(&table, &BTreeSet::new());
        assert!(full.contains("CONSTRAINT `fk_b`"));
        let deferred = create_table(&table, &BTreeSet::from(["fk_b".to_string()]));
        assert!(!deferred.contains("FOREIGN KEY"));
        assert!(deferred.starts_with("CREATE TABLE `a` (\n  `id` int NOT NULL,"));
    }
}
