use anyhow::{anyhow, Context, Result};
use declaro_core::{validate_schema, ColumnDefault, FkAction};
use declaro_introspect::{detect_flavor, introspect_mysql};
use sqlx::mysql::MySqlPoolOptions;
use std::env;

const SCHEMA: &str = "_declaro_introspect_test";

const FIXTURE: &[&str] = &[
    "CREATE TABLE users (
        id int unsigned NOT NULL AUTO_INCREMENT,
        email varchar(255) NOT NULL,
        created_at timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (id),
        UNIQUE KEY uniq_email (email)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
    "CREATE TABLE orders (
        id bigint NOT NULL AUTO_INCREMENT,
        user_id int unsigned NOT NULL,
        note varchar(20) DEFAULT 'none',
        PRIMARY KEY (id),
        KEY idx_user (user_id),
        CONSTRAINT fk_orders_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
    "INSERT INTO users (email) VALUES ('a@example.com')",
];

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL").ok()
}

#[tokio::test]
async fn introspects_tables_indexes_and_foreign_keys() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to MySQL")?;

    sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{SCHEMA}`"))
        .execute(&pool)
        .await?;
    sqlx::raw_sql(&format!("CREATE DATABASE `{SCHEMA}`"))
        .execute(&pool)
        .await?;
    for statement in FIXTURE {
        sqlx::raw_sql(&format!("USE `{SCHEMA}`; {statement}"))
            .execute(&pool)
            .await
            .with_context(|| format!("executing fixture {statement}"))?;
    }

    let flavor = detect_flavor(&pool).await?;
    assert!(flavor.is_known());

    let schema = introspect_mysql(&pool, SCHEMA).await?;
    validate_schema(&schema)?;
    assert_eq!(schema.tables.len(), 2);

    let users = schema
        .table("users")
        .ok_or_else(|| anyhow!("expected users table"))?;
    assert!(users.columns[0].auto_increment);
    assert!(matches!(
        users.column("created_at").and_then(|col| col.default.clone()),
        Some(ColumnDefault::Expression(_))
    ));
    assert_eq!(users.primary_key().map(|pk| pk.name.as_str()), Some("PRIMARY"));
    assert!(users.index("uniq_email").is_some_and(|idx| idx.unique));
    assert!(!users.create_statement.contains("AUTO_INCREMENT="));
    assert_eq!(users.auto_increment, Some(2));

    let orders = schema
        .table("orders")
        .ok_or_else(|| anyhow!("expected orders table"))?;
    assert_eq!(
        orders.column("note").and_then(|col| col.default.clone()),
        Some(ColumnDefault::Literal("none".to_string()))
    );
    let fk = orders
        .foreign_key("fk_orders_user")
        .ok_or_else(|| anyhow!("expected fk_orders_user"))?;
    assert!(fk.is_same_schema());
    assert_eq!(fk.referenced_table, "users");
    assert_eq!(fk.on_delete, FkAction::Cascade);

    sqlx::raw_sql(&format!("DROP DATABASE `{SCHEMA}`"))
        .execute(&pool)
        .await?;
    Ok(())
}
