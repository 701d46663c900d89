//! Applying a rendered diff to the current schema must reproduce the desired
//! one. Each case builds both schemas on a live server, applies
//! `diff(desired, current).render()` to the current schema and reads it back.

use anyhow::{anyhow, Context, Result};
use declaro_core::{DiffFlags, Options, Schema};
use declaro_diff::diff;
use declaro_introspect::{detect_flavor, introspect_mysql};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::env;

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL").ok()
}

async fn connect() -> Result<Option<MySqlPool>> {
    let Some(db_url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(None);
    };
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to MySQL")?;
    Ok(Some(pool))
}

async fn recreate(pool: &MySqlPool, schema: &str, statements: &[&str]) -> Result<Schema> {
    sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{schema}`"))
        .execute(pool)
        .await?;
    sqlx::raw_sql(&format!("CREATE DATABASE `{schema}`"))
        .execute(pool)
        .await?;
    for statement in statements {
        sqlx::raw_sql(&format!("USE `{schema}`; {statement}"))
            .execute(pool)
            .await
            .with_context(|| format!("executing fixture {statement}"))?;
    }
    Ok(introspect_mysql(pool, schema).await?)
}

async fn round_trip(case: &str, current: &[&str], desired: &[&str]) -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let desired_name = format!("_declaro_rt_{case}_want");
    let current_name = format!("_declaro_rt_{case}_have");

    let want = recreate(&pool, &desired_name, desired).await?;
    let have = recreate(&pool, &current_name, current).await?;

    let mut options = Options {
        diff: DiffFlags {
            allow_destructive: true,
            ..DiffFlags::default()
        },
        ..Options::default()
    };
    options.flavor = detect_flavor(&pool).await?;

    let plan = diff(&want, &have, &options);
    assert!(!plan.is_empty(), "{case}: fixtures are already identical");
    assert!(plan.blocked(&options.diff).is_empty(), "{case}: blocked operations:\n{plan}");
    for statement in plan.render(&options.diff) {
        sqlx::raw_sql(&format!("USE `{current_name}`; {statement}"))
            .execute(&pool)
            .await
            .with_context(|| format!("{case}: applying {statement}"))?;
    }

    let applied = introspect_mysql(&pool, &current_name).await?;
    assert_eq!(applied.tables.len(), want.tables.len(), "{case}: table count");
    for table in &want.tables {
        let got = applied
            .table(&table.name)
            .ok_or_else(|| anyhow!("{case}: table {} missing after apply", table.name))?;
        assert!(
            table.same_structure(got),
            "{case}: {} differs after apply\nwant {table:#?}\ngot {got:#?}",
            table.name
        );
    }
    let leftover = diff(&want, &applied, &options);
    assert!(leftover.is_empty(), "{case}: diff not empty after apply:\n{leftover}");

    for schema in [&desired_name, &current_name] {
        sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{schema}`"))
            .execute(&pool)
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn column_added_mid_table() -> Result<()> {
    round_trip(
        "mid_column",
        &["CREATE TABLE users (
            id int NOT NULL,
            name varchar(40) NOT NULL,
            created_at datetime NULL,
            PRIMARY KEY (id)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"],
        &["CREATE TABLE users (
            id int NOT NULL,
            name varchar(40) NOT NULL,
            email varchar(255) NOT NULL DEFAULT '',
            created_at datetime NULL,
            PRIMARY KEY (id)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"],
    )
    .await
}

#[tokio::test]
async fn column_type_widened() -> Result<()> {
    round_trip(
        "widen",
        &["CREATE TABLE counters (
            id int NOT NULL,
            hits int unsigned NULL,
            PRIMARY KEY (id)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"],
        &["CREATE TABLE counters (
            id int NOT NULL,
            hits bigint unsigned NULL,
            PRIMARY KEY (id)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"],
    )
    .await
}

#[tokio::test]
async fn index_dropped_and_added_again() -> Result<()> {
    round_trip(
        "reindex",
        &["CREATE TABLE people (
            id int NOT NULL,
            last_name varchar(40) NOT NULL,
            first_name varchar(40) NOT NULL,
            PRIMARY KEY (id),
            KEY idx_name (last_name)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"],
        &["CREATE TABLE people (
            id int NOT NULL,
            last_name varchar(40) NOT NULL,
            first_name varchar(40) NOT NULL,
            PRIMARY KEY (id),
            KEY idx_name (last_name, first_name)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"],
    )
    .await
}

#[tokio::test]
async fn foreign_key_between_tables() -> Result<()> {
    const USERS: &str = "CREATE TABLE users (
        id int NOT NULL,
        PRIMARY KEY (id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
    round_trip(
        "fk",
        &[
            USERS,
            "CREATE TABLE orders (
                id int NOT NULL,
                user_id int NOT NULL,
                PRIMARY KEY (id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        ],
        &[
            USERS,
            "CREATE TABLE orders (
                id int NOT NULL,
                user_id int NOT NULL,
                PRIMARY KEY (id),
                KEY fk_orders_user (user_id),
                CONSTRAINT fk_orders_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        ],
    )
    .await
}

#[tokio::test]
async fn new_table_referencing_existing_one() -> Result<()> {
    const USERS: &str = "CREATE TABLE users (
        id int NOT NULL,
        PRIMARY KEY (id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
    round_trip(
        "new_table",
        &[USERS],
        &[
            USERS,
            "CREATE TABLE sessions (
                id bigint NOT NULL AUTO_INCREMENT,
                user_id int NOT NULL,
                token char(32) NOT NULL,
                PRIMARY KEY (id),
                UNIQUE KEY uniq_token (token),
                KEY fk_sessions_user (user_id),
                CONSTRAINT fk_sessions_user FOREIGN KEY (user_id) REFERENCES users (id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        ],
    )
    .await
}
