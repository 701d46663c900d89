//! Database introspection adapters.

pub mod adapter;
pub mod mysql;
pub mod options;

pub use adapter::Adapter;
pub use mysql::{detect_flavor, introspect_mysql, introspect_mysql_with_options, MysqlAdapter};
pub use options::IntrospectOptions;

pub use declaro_core::Schema;
