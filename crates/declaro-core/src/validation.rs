use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Validate internal consistency of an introspected schema.
///
/// This checks:
/// - duplicate table, routine, column and index names
/// - foreign key names are unique across the schema
/// - index and foreign key columns exist
/// - same-schema foreign keys point at existing tables and columns
pub fn validate_schema(schema: &Schema) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for table in &schema.tables {
        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }
        if catalog.insert(table.name.as_str(), columns).is_some() {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
    }

    let mut routines = BTreeSet::new();
    for routine in &schema.routines {
        if !routines.insert(routine.key()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate routine: {}",
                routine.key()
            )));
        }
    }

    let mut fk_names = BTreeSet::new();
    for table in &schema.tables {
        let Some(columns) = catalog.get(table.name.as_str()) else {
            continue;
        };

        let mut index_names = BTreeSet::new();
        for index in &table.indexes {
            if !index_names.insert(index.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate index name: {}.{}",
                    table.name, index.name
                )));
            }
            for column in index.column_names() {
                if !columns.contains(column) {
                    return Err(Error::InvalidSchema(format!(
                        "index column not found: {}.{} ({})",
                        table.name, column, index.name
                    )));
                }
            }
        }

        for fk in &table.foreign_keys {
            if !fk_names.insert(fk.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate foreign key name: {}",
                    fk.name
                )));
            }
            for column in &fk.columns {
                if !columns.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "foreign key column not found: {}.{}",
                        table.name, column
                    )));
                }
            }
            if !fk.is_same_schema() {
                continue;
            }
            let ref_columns = catalog.get(fk.referenced_table.as_str()).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "referenced table not found: {}",
                    fk.referenced_table
                ))
            })?;
            for column in &fk.referenced_columns {
                if !ref_columns.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "referenced column not found: {}.{}",
                        fk.referenced_table, column
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{ForeignKey, Index};
    use crate::flavor::Flavor;
    use crate::schema::{Column, Table};

    fn users() -> Table {
        let mut table = Table::new("users");
        table.columns.push(Column::new("id", "int").not_null());
        table.indexes.push(Index::primary_key(&["id"]));
        table
    }

    fn orders(fk_name: &str) -> Table {
        let mut table = Table::new(format!("orders_{fk_name}"));
        table.columns.push(Column::new("id", "int").not_null());
        table.columns.push(Column::new("user_id", "int"));
        table
            .foreign_keys
            .push(ForeignKey::new(fk_name, &["user_id"], "users", &["id"]));
        table
    }

    #[test]
    fn accepts_consistent_schema() {
        let mut schema = Schema::new("app", Flavor::UNKNOWN);
        schema.tables = vec![users(), orders("fk_user")];
        validate_schema(&schema).unwrap();
    }

    #[test]
    fn rejects_duplicate_fk_names_across_tables() {
        let mut schema = Schema::new("app", Flavor::UNKNOWN);
        let mut second = orders("fk_user");
        second.name = "invoices".to_string();
        schema.tables = vec![users(), orders("fk_user"), second];
        let err = validate_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("duplicate foreign key name"));
    }

    #[test]
    fn rejects_missing_referenced_column() {
        let mut schema = Schema::new("app", Flavor::UNKNOWN);
        let mut bad = orders("fk_user");
        bad.foreign_keys[0].referenced_columns = vec!["uuid".to_string()];
        schema.tables = vec![users(), bad];
        let err = validate_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("referenced column not found"));
    }

    #[test]
    fn rejects_duplicate_index_names() {
        let mut schema = Schema::new("app", Flavor::UNKNOWN);
        let mut table = users();
        table.indexes.push(Index::new("idx", &["id"]));
        table.indexes.push(Index::new("idx", &["id"]));
        schema.tables = vec![table];
        assert!(validate_schema(&schema).is_err());
    }
}
