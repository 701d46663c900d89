use sqlx::{MySqlPool, Row};

use declaro_core::{quote_identifier, Error, Flavor, Result};

fn db_err(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

pub async fn fetch_server_version(pool: &MySqlPool) -> Result<(String, String)> {
    let row = sqlx::query("SELECT @@version AS version, @@version_comment AS version_comment")
        .fetch_one(pool)
        .await
        .map_err(db_err)?;
    let version: String = row.try_get("version").map_err(db_err)?;
    let comment: String = row.try_get("version_comment").map_err(db_err)?;
    Ok((version, comment))
}

pub struct RawSchema {
    pub charset: String,
    pub collation: String,
}

pub async fn fetch_schema(pool: &MySqlPool, schema: &str) -> Result<Option<RawSchema>> {
    let row = sqlx::query(
        r#"
        SELECT default_character_set_name AS charset,
               default_collation_name AS collation
        FROM information_schema.schemata
        WHERE schema_name = ?
        "#,
    )
    .bind(schema)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.map(|row| {
        Ok(RawSchema {
            charset: row.try_get("charset").map_err(db_err)?,
            collation: row.try_get("collation").map_err(db_err)?,
        })
    })
    .transpose()
}

pub struct RawTable {
    pub name: String,
    pub engine: Option<String>,
    pub collation: Option<String>,
    pub create_options: Option<String>,
    pub comment: Option<String>,
    pub auto_increment: Option<i64>,
}

pub async fn list_tables(pool: &MySqlPool, schema: &str) -> Result<Vec<RawTable>> {
    let rows = sqlx::query(
        r#"
        SELECT table_name AS name,
               engine AS engine,
               table_collation AS collation,
               create_options AS create_options,
               table_comment AS comment,
               CAST(auto_increment AS SIGNED) AS auto_increment
        FROM information_schema.tables
        WHERE table_schema = ? AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawTable {
                name: row.try_get("name").map_err(db_err)?,
                engine: row.try_get("engine").map_err(db_err)?,
                collation: row.try_get("collation").map_err(db_err)?,
                create_options: row.try_get("create_options").map_err(db_err)?,
                comment: row.try_get("comment").map_err(db_err)?,
                auto_increment: row.try_get("auto_increment").map_err(db_err)?,
            })
        })
        .collect()
}

pub struct RawColumn {
    pub table: String,
    pub name: String,
    pub column_type: String,
    pub is_nullable: String,
    pub default: Option<String>,
    pub extra: String,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: String,
    pub generation_expression: Option<String>,
}

pub async fn list_columns(pool: &MySqlPool, schema: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query(
        r#"
        SELECT table_name AS table_name,
               column_name AS name,
               column_type AS column_type,
               is_nullable AS is_nullable,
               column_default AS column_default,
               extra AS extra,
               character_set_name AS charset,
               collation_name AS collation,
               column_comment AS comment,
               generation_expression AS generation_expression
        FROM information_schema.columns
        WHERE table_schema = ?
        ORDER BY table_name, ordinal_position
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawColumn {
                table: row.try_get("table_name").map_err(db_err)?,
                name: row.try_get("name").map_err(db_err)?,
                column_type: row.try_get("column_type").map_err(db_err)?,
                is_nullable: row.try_get("is_nullable").map_err(db_err)?,
                default: row.try_get("column_default").map_err(db_err)?,
                extra: row
                    .try_get::<Option<String>, _>("extra")
                    .map_err(db_err)?
                    .unwrap_or_default(),
                charset: row.try_get("charset").map_err(db_err)?,
                collation: row.try_get("collation").map_err(db_err)?,
                comment: row
                    .try_get::<Option<String>, _>("comment")
                    .map_err(db_err)?
                    .unwrap_or_default(),
                generation_expression: row.try_get("generation_expression").map_err(db_err)?,
            })
        })
        .collect()
}

pub struct RawIndexPart {
    pub table: String,
    pub index: String,
    pub non_unique: bool,
    pub column: Option<String>,
    pub sub_part: Option<i64>,
    pub index_type: String,
    pub comment: String,
    pub descending: bool,
    pub visible: bool,
    pub expression: Option<String>,
}

pub async fn list_index_parts(
    pool: &MySqlPool,
    schema: &str,
    flavor: &Flavor,
) -> Result<Vec<RawIndexPart>> {
    let visible = if flavor.is_mysql() && flavor.at_least(8, 0, 0) {
        "is_visible"
    } else if flavor.is_mariadb() && flavor.at_least(10, 6, 0) {
        "IF(ignored = 'YES', 'NO', 'YES')"
    } else {
        "'YES'"
    };
    let expression = if flavor.is_mysql() && flavor.at_least(8, 0, 13) {
        "expression"
    } else {
        "NULL"
    };
    let sql = format!(
        r#"
        SELECT table_name AS table_name,
               index_name AS index_name,
               CAST(non_unique AS SIGNED) AS non_unique,
               column_name AS column_name,
               CAST(sub_part AS SIGNED) AS sub_part,
               index_type AS index_type,
               index_comment AS index_comment,
               collation AS part_collation,
               {visible} AS is_visible,
               {expression} AS expression
        FROM information_schema.statistics
        WHERE table_schema = ?
        ORDER BY table_name, index_name, seq_in_index
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            let non_unique: i64 = row.try_get("non_unique").map_err(db_err)?;
            let collation: Option<String> = row.try_get("part_collation").map_err(db_err)?;
            let visible: Option<String> = row.try_get("is_visible").map_err(db_err)?;
            Ok(RawIndexPart {
                table: row.try_get("table_name").map_err(db_err)?,
                index: row.try_get("index_name").map_err(db_err)?,
                non_unique: non_unique != 0,
                column: row.try_get("column_name").map_err(db_err)?,
                sub_part: row.try_get("sub_part").map_err(db_err)?,
                index_type: row.try_get("index_type").map_err(db_err)?,
                comment: row
                    .try_get::<Option<String>, _>("index_comment")
                    .map_err(db_err)?
                    .unwrap_or_default(),
                descending: collation.as_deref() == Some("D"),
                visible: visible.as_deref() != Some("NO"),
                expression: row.try_get("expression").map_err(db_err)?,
            })
        })
        .collect()
}

pub struct RawForeignKeyPart {
    pub table: String,
    pub name: String,
    pub column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub update_rule: String,
    pub delete_rule: String,
}

pub async fn list_foreign_key_parts(
    pool: &MySqlPool,
    schema: &str,
) -> Result<Vec<RawForeignKeyPart>> {
    let rows = sqlx::query(
        r#"
        SELECT kcu.table_name AS table_name,
               kcu.constraint_name AS constraint_name,
               kcu.column_name AS column_name,
               kcu.referenced_table_schema AS referenced_schema,
               kcu.referenced_table_name AS referenced_table,
               kcu.referenced_column_name AS referenced_column,
               rc.update_rule AS update_rule,
               rc.delete_rule AS delete_rule
        FROM information_schema.referential_constraints rc
        JOIN information_schema.key_column_usage kcu
          ON kcu.constraint_schema = rc.constraint_schema
         AND kcu.constraint_name = rc.constraint_name
         AND kcu.table_name = rc.table_name
        WHERE rc.constraint_schema = ?
          AND kcu.referenced_table_name IS NOT NULL
        ORDER BY kcu.table_name, kcu.constraint_name, kcu.ordinal_position
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawForeignKeyPart {
                table: row.try_get("table_name").map_err(db_err)?,
                name: row.try_get("constraint_name").map_err(db_err)?,
                column: row.try_get("column_name").map_err(db_err)?,
                referenced_schema: row.try_get("referenced_schema").map_err(db_err)?,
                referenced_table: row.try_get("referenced_table").map_err(db_err)?,
                referenced_column: row.try_get("referenced_column").map_err(db_err)?,
                update_rule: row.try_get("update_rule").map_err(db_err)?,
                delete_rule: row.try_get("delete_rule").map_err(db_err)?,
            })
        })
        .collect()
}

pub struct RawRoutine {
    pub name: String,
    pub routine_type: String,
    pub returns: Option<String>,
    pub body: Option<String>,
    pub deterministic: String,
    pub data_access: String,
    pub security: String,
    pub comment: String,
    pub sql_mode: String,
}

pub async fn list_routines(pool: &MySqlPool, schema: &str) -> Result<Vec<RawRoutine>> {
    let rows = sqlx::query(
        r#"
        SELECT routine_name AS name,
               routine_type AS routine_type,
               dtd_identifier AS returns,
               routine_definition AS body,
               is_deterministic AS deterministic,
               sql_data_access AS data_access,
               security_type AS security,
               routine_comment AS comment,
               sql_mode AS sql_mode
        FROM information_schema.routines
        WHERE routine_schema = ?
        ORDER BY routine_type, routine_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawRoutine {
                name: row.try_get("name").map_err(db_err)?,
                routine_type: row.try_get("routine_type").map_err(db_err)?,
                returns: row.try_get("returns").map_err(db_err)?,
                body: row.try_get("body").map_err(db_err)?,
                deterministic: row.try_get("deterministic").map_err(db_err)?,
                data_access: row.try_get("data_access").map_err(db_err)?,
                security: row.try_get("security").map_err(db_err)?,
                comment: row
                    .try_get::<Option<String>, _>("comment")
                    .map_err(db_err)?
                    .unwrap_or_default(),
                sql_mode: row.try_get("sql_mode").map_err(db_err)?,
            })
        })
        .collect()
}

pub struct RawParameter {
    pub routine: String,
    pub routine_type: String,
    pub mode: Option<String>,
    pub name: Option<String>,
    pub dtd_identifier: String,
}

pub async fn list_parameters(pool: &MySqlPool, schema: &str) -> Result<Vec<RawParameter>> {
    let rows = sqlx::query(
        r#"
        SELECT specific_name AS routine_name,
               routine_type AS routine_type,
               parameter_mode AS parameter_mode,
               parameter_name AS parameter_name,
               dtd_identifier AS dtd_identifier
        FROM information_schema.parameters
        WHERE specific_schema = ? AND ordinal_position > 0
        ORDER BY specific_name, ordinal_position
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawParameter {
                routine: row.try_get("routine_name").map_err(db_err)?,
                routine_type: row.try_get("routine_type").map_err(db_err)?,
                mode: row.try_get("parameter_mode").map_err(db_err)?,
                name: row.try_get("parameter_name").map_err(db_err)?,
                dtd_identifier: row.try_get("dtd_identifier").map_err(db_err)?,
            })
        })
        .collect()
}

pub async fn show_create_table(pool: &MySqlPool, schema: &str, table: &str) -> Result<String> {
    let sql = format!(
        "SHOW CREATE TABLE {}.{}",
        quote_identifier(schema),
        quote_identifier(table)
    );
    let row = sqlx::query(&sql).fetch_one(pool).await.map_err(db_err)?;
    row.try_get::<String, _>(1).map_err(db_err)
}

/// `SHOW CREATE PROCEDURE|FUNCTION`; the text is NULL when the session lacks
/// privileges on the routine.
pub async fn show_create_routine(
    pool: &MySqlPool,
    schema: &str,
    keyword: &str,
    name: &str,
) -> Result<Option<String>> {
    let sql = format!(
        "SHOW CREATE {keyword} {}.{}",
        quote_identifier(schema),
        quote_identifier(name)
    );
    let row = sqlx::query(&sql).fetch_one(pool).await.map_err(db_err)?;
    row.try_get::<Option<String>, _>(2).map_err(db_err)
}
