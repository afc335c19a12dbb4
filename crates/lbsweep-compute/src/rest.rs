//! Compute Engine v1 REST client.
//!
//! Requests go to `{endpoint}/projects/{project}/...` with a bearer token
//! obtained per request from a [`TokenSource`]. List calls follow
//! `nextPageToken` until the collection is exhausted. A 404 anywhere maps to
//! [`ComputeError::NotFound`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use lbsweep_core::{
    BackendService, Firewall, ForwardingRule, GroupMember, Instance, ProxyProtocol, ResourceKind,
    ResourceRef, TargetProxy, UrlMap, Zone,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::ComputeError;
use crate::token::{COMPUTE_SCOPE, DynTokenSource};
use crate::traits::ComputeApi;

/// Public Compute Engine v1 endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Configuration for [`ComputeClient`].
#[derive(Debug, Clone)]
pub struct ComputeClientConfig {
    pub project_id: String,
    /// Base URL up to and including the API version.
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl ComputeClientConfig {
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// One page of a plain list call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// One page of `aggregated/forwardingRules`, keyed by scope (`global`, `regions/x`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedPage {
    #[serde(default)]
    items: BTreeMap<String, ScopedForwardingRules>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopedForwardingRules {
    #[serde(default)]
    forwarding_rules: Vec<ForwardingRule>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

/// Compute Engine client over `reqwest`.
pub struct ComputeClient {
    config: ComputeClientConfig,
    tokens: DynTokenSource,
    http: reqwest::Client,
}

impl std::fmt::Debug for ComputeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeClient")
            .field("config", &self.config)
            .field("tokens", &"<TokenSource>")
            .finish()
    }
}

impl ComputeClient {
    pub fn new(config: ComputeClientConfig, tokens: DynTokenSource) -> Result<Self, ComputeError> {
        Url::parse(&config.endpoint)
            .map_err(|e| ComputeError::transport(format!("Invalid compute endpoint: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ComputeError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            tokens,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.project_id,
            path
        )
    }

    async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ComputeError> {
        let token = self.tokens.token(&[COMPUTE_SCOPE]).await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ComputeError::transport(format!("{path}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ComputeError::not_found(path));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = serde_json::from_str::<GoogleErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(ComputeError::api(status.as_u16(), message))
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ComputeError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ComputeError::decode(format!("{path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ComputeError> {
        let response = self.send(path, self.http.get(self.url(path))).await?;
        Self::decode(path, response).await
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ComputeError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(self.url(path));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: Page<T> = Self::decode(path, self.send(path, request).await?).await?;
            items.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!(path, count = items.len(), "listed");
        Ok(items)
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    fn project_id(&self) -> &str {
        &self.config.project_id
    }

    async fn aggregated_forwarding_rules(&self) -> Result<Vec<ForwardingRule>, ComputeError> {
        let path = "aggregated/forwardingRules";
        let mut rules = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(self.url(path));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: AggregatedPage = Self::decode(path, self.send(path, request).await?).await?;
            rules.extend(
                page.items
                    .into_values()
                    .flat_map(|scoped| scoped.forwarding_rules),
            );
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!(count = rules.len(), "listed forwarding rules");
        Ok(rules)
    }

    async fn get_forwarding_rule(
        &self,
        rule: &ResourceRef,
    ) -> Result<ForwardingRule, ComputeError> {
        self.get(&rule.api_path()).await
    }

    async fn list_target_proxies(
        &self,
        protocol: ProxyProtocol,
    ) -> Result<Vec<TargetProxy>, ComputeError> {
        self.list(&format!("global/{}", protocol.kind().collection()))
            .await
    }

    async fn get_target_proxy(&self, proxy: &ResourceRef) -> Result<TargetProxy, ComputeError> {
        self.get(&proxy.api_path()).await
    }

    async fn get_url_map(&self, url_map: &ResourceRef) -> Result<UrlMap, ComputeError> {
        self.get(&url_map.api_path()).await
    }

    async fn get_backend_service(
        &self,
        service: &ResourceRef,
    ) -> Result<BackendService, ComputeError> {
        self.get(&service.api_path()).await
    }

    async fn list_group_members(
        &self,
        group: &ResourceRef,
    ) -> Result<Vec<GroupMember>, ComputeError> {
        let path = format!("{}/listInstances", group.api_path());
        let body = serde_json::json!({ "instanceState": "ALL" });

        let mut members = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.post(self.url(&path)).json(&body);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: Page<GroupMember> =
                Self::decode(&path, self.send(&path, request).await?).await?;
            members.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(members)
    }

    async fn list_firewalls(&self) -> Result<Vec<Firewall>, ComputeError> {
        self.list(&format!("global/{}", ResourceKind::Firewall.collection()))
            .await
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, ComputeError> {
        self.list("zones").await
    }

    async fn list_instances(&self, zone: &str) -> Result<Vec<Instance>, ComputeError> {
        self.list(&format!("zones/{zone}/instances")).await
    }

    async fn delete(&self, target: &ResourceRef) -> Result<(), ComputeError> {
        let path = target.api_path();
        self.send(&path, self.http.delete(self.url(&path))).await?;
        Ok(())
    }
}
