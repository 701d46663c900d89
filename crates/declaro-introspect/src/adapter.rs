use async_trait::async_trait;

use declaro_core::{Flavor, Result, Schema};

use crate::options::IntrospectOptions;

/// Trait implemented by database adapters that can introspect schemas.
#[async_trait]
pub trait Adapter {
    /// Returns the engine identifier (e.g. `mysql`).
    fn engine(&self) -> &'static str;

    /// Vendor and version of the connected server.
    async fn flavor(&self) -> Result<Flavor>;

    /// Introspect one schema and return a structural snapshot.
    async fn introspect(&self, schema: &str, opts: &IntrospectOptions) -> Result<Schema>;
}
