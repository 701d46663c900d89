use std::collections::BTreeMap;

use sqlx::MySqlPool;

use declaro_core::{Error, Flavor, Result, Schema};

use crate::adapter::Adapter;
use crate::options::IntrospectOptions;

mod mapper;
mod queries;

pub use mapper::strip_auto_increment;

/// Adapter for MySQL-compatible servers (MySQL, Percona Server, MariaDB).
#[derive(Debug, Clone)]
pub struct MysqlAdapter {
    pool: MySqlPool,
}

impl MysqlAdapter {
    /// Create a new adapter using a pre-configured pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Adapter for MysqlAdapter {
    fn engine(&self) -> &'static str {
        "mysql"
    }

    async fn flavor(&self) -> Result<Flavor> {
        detect_flavor(&self.pool).await
    }

    async fn introspect(&self, schema: &str, opts: &IntrospectOptions) -> Result<Schema> {
        introspect(&self.pool, schema, opts).await
    }
}

/// Reads `@@version` and `@@version_comment` into a [`Flavor`].
pub async fn detect_flavor(pool: &MySqlPool) -> Result<Flavor> {
    let (version, comment) = queries::fetch_server_version(pool).await?;
    Ok(Flavor::from_server_version(&version, &comment))
}

/// Introspect one schema with default options.
pub async fn introspect_mysql(pool: &MySqlPool, schema: &str) -> Result<Schema> {
    introspect_mysql_with_options(pool, schema, IntrospectOptions::default()).await
}

/// Introspect one schema with caller-provided options.
pub async fn introspect_mysql_with_options(
    pool: &MySqlPool,
    schema: &str,
    opts: IntrospectOptions,
) -> Result<Schema> {
    introspect(pool, schema, &opts).await
}

/// Introspect a MySQL schema according to the provided options.
pub async fn introspect(pool: &MySqlPool, schema: &str, opts: &IntrospectOptions) -> Result<Schema> {
    let flavor = match opts.flavor {
        Some(flavor) => flavor,
        None => detect_flavor(pool).await?,
    };
    let raw_schema = queries::fetch_schema(pool, schema)
        .await?
        .ok_or_else(|| Error::Db(format!("schema {schema} does not exist")))?;

    let mut tables: Vec<_> = queries::list_tables(pool, schema)
        .await?
        .into_iter()
        .map(|raw| mapper::map_table(raw, opts))
        .collect();

    let mut create_statements = BTreeMap::new();
    if opts.include_create_statements {
        for table in &tables {
            let create = queries::show_create_table(pool, schema, &table.name).await?;
            create_statements.insert(table.name.clone(), mapper::strip_auto_increment(&create));
        }
    }

    let mut columns = mapper::map_columns(queries::list_columns(pool, schema).await?, &flavor, opts);
    let mut indexes = mapper::map_indexes(
        queries::list_index_parts(pool, schema, &flavor).await?,
        &create_statements,
    );
    let mut foreign_keys =
        mapper::map_foreign_keys(queries::list_foreign_key_parts(pool, schema).await?, schema);

    for table in &mut tables {
        table.columns = columns.remove(&table.name).unwrap_or_default();
        table.indexes = indexes.remove(&table.name).unwrap_or_default();
        table.foreign_keys = foreign_keys.remove(&table.name).unwrap_or_default();
        table.create_statement = create_statements.remove(&table.name).unwrap_or_default();
    }

    let mut routines = Vec::new();
    if opts.include_routines {
        let mut params = mapper::map_parameters(queries::list_parameters(pool, schema).await?);
        for raw in queries::list_routines(pool, schema).await? {
            let key = (raw.routine_type.to_ascii_uppercase(), raw.name.clone());
            let create = if opts.include_create_statements {
                queries::show_create_routine(pool, schema, &key.0, &raw.name).await?
            } else {
                None
            };
            let rendered = params.remove(&key).unwrap_or_default();
            if let Some(routine) = mapper::map_routine(raw, rendered, create) {
                routines.push(routine);
            }
        }
    }

    tracing::debug!(
        event = "introspect_complete",
        schema,
        flavor = %flavor,
        tables = tables.len(),
        routines = routines.len(),
        "introspected schema"
    );

    Ok(Schema {
        name: schema.to_string(),
        flavor,
        charset: raw_schema.charset,
        collation: raw_schema.collation,
        tables,
        routines,
    })
}
