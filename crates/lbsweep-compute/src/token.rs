//! Bearer tokens for Google APIs.

use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider;

use crate::error::ComputeError;

/// Read-write access to Compute Engine.
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";
/// Broad scope used for Cloud Tasks.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies an access token for each outgoing request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, scopes: &[&str]) -> Result<String, ComputeError>;
}

pub type DynTokenSource = Arc<dyn TokenSource>;

/// Token source backed by `gcp_auth` credential discovery
/// (metadata server, application default credentials, key file).
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for GcpTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpTokenSource")
            .field("provider", &"<TokenProvider>")
            .finish()
    }
}

impl GcpTokenSource {
    /// Discovers credentials from the environment.
    pub async fn discover() -> Result<Self, ComputeError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| ComputeError::auth(format!("Failed to initialize GCP auth: {e}")))?;
        Ok(Self { provider })
    }

    /// Project the discovered credentials belong to.
    pub async fn project_id(&self) -> Result<String, ComputeError> {
        self.provider
            .project_id()
            .await
            .map(|id| id.to_string())
            .map_err(|e| ComputeError::auth(format!("Failed to resolve project id: {e}")))
    }
}

#[async_trait]
impl TokenSource for GcpTokenSource {
    async fn token(&self, scopes: &[&str]) -> Result<String, ComputeError> {
        let token = self
            .provider
            .token(scopes)
            .await
            .map_err(|e| ComputeError::auth(format!("Failed to get GCP access token: {e}")))?;
        Ok(token.as_str().to_string())
    }
}

/// Fixed token, for emulators and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self, _scopes: &[&str]) -> Result<String, ComputeError> {
        Ok(self.0.clone())
    }
}
