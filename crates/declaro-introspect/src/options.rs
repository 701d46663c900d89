use declaro_core::Flavor;

/// Options that control how introspection behaves.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    pub include_routines: bool,
    /// Fetch `SHOW CREATE` text for tables and routines.
    pub include_create_statements: bool,
    pub include_comments: bool,
    /// Flavor to assume instead of querying the server.
    pub flavor: Option<Flavor>,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            include_routines: true,
            include_create_statements: true,
            include_comments: true,
            flavor: None,
        }
    }
}
