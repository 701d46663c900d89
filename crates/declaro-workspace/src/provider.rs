use declaro_core::Endpoint;

/// Supplies connection details for an existing server.
///
/// How credentials are obtained is up to the implementation; workspaces only
/// ask for an endpoint when they are created.
pub trait ConnectionProvider: Send + Sync {
    fn endpoint(&self) -> Endpoint;
}

/// Provider returning a fixed endpoint.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    endpoint: Endpoint,
}

impl StaticProvider {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

impl ConnectionProvider for StaticProvider {
    fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }
}
