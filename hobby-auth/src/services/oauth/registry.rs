use std::collections::HashMap;
use std::sync::Arc;

use super::OAuthProvider;
use crate::services::error::ServiceError;

/// Enabled providers keyed by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        tracing::info!(provider = %provider.name(), "OAuth provider enabled");
        self.providers.insert(provider.name(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OAuthProvider>, ServiceError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
