//! Google Cloud Tasks work queue.
//!
//! Each job becomes one HTTP task that POSTs the JSON-encoded job to
//! `{service_url}/jobs`. Cloud Tasks redelivers until that endpoint answers
//! with a 2xx status.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use lbsweep_compute::{CLOUD_PLATFORM_SCOPE, DynTokenSource};
use lbsweep_core::Job;
use serde::{Deserialize, Serialize};

use super::WorkQueue;
use crate::error::QueueError;

/// Public Cloud Tasks v2 endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://cloudtasks.googleapis.com/v2";

/// Route that executes delivered jobs.
pub const JOBS_PATH: &str = "/jobs";

/// Configuration for [`CloudTasksQueue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudTasksConfig {
    pub project_id: String,
    /// Cloud Tasks location (e.g., "us-central1").
    pub location: String,
    pub queue_name: String,
    /// Public base URL of this service.
    pub service_url: String,
    /// Service account for OIDC-authenticated delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
    pub api_endpoint: String,
    pub request_timeout: Duration,
}

impl CloudTasksConfig {
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        queue_name: impl Into<String>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            queue_name: queue_name.into(),
            service_url: service_url.into(),
            service_account_email: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_service_account(mut self, email: impl Into<String>) -> Self {
        self.service_account_email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the full queue path for Cloud Tasks API.
    #[must_use]
    pub fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        )
    }

    /// URL every task is delivered to.
    #[must_use]
    pub fn target_url(&self) -> String {
        format!("{}{JOBS_PATH}", self.service_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    task: CloudTask,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CloudTask {
    http_request: HttpRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequest {
    url: String,
    http_method: &'static str,
    headers: HashMap<String, String>,
    /// Base64-encoded request body.
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_token: Option<OidcToken>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OidcToken {
    service_account_email: String,
    audience: String,
}

#[derive(Debug, Deserialize)]
struct CloudTasksErrorResponse {
    error: CloudTasksError,
}

#[derive(Debug, Deserialize)]
struct CloudTasksError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub struct CloudTasksQueue {
    config: CloudTasksConfig,
    tokens: DynTokenSource,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudTasksQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudTasksQueue")
            .field("config", &self.config)
            .field("tokens", &"<TokenSource>")
            .finish()
    }
}

impl CloudTasksQueue {
    pub fn new(config: CloudTasksConfig, tokens: DynTokenSource) -> Result<Self, QueueError> {
        if config.project_id.is_empty() {
            return Err(QueueError::configuration("project_id cannot be empty"));
        }
        if config.location.is_empty() {
            return Err(QueueError::configuration("location cannot be empty"));
        }
        if config.queue_name.is_empty() {
            return Err(QueueError::configuration("queue_name cannot be empty"));
        }
        if config.service_url.is_empty() {
            return Err(QueueError::configuration("service_url cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QueueError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            tokens,
            client,
        })
    }

    pub fn config(&self) -> &CloudTasksConfig {
        &self.config
    }

    fn create_task_request(&self, job: &Job) -> Result<CreateTaskRequest, QueueError> {
        let body = serde_json::to_vec(job)?;
        let url = self.config.target_url();
        let oidc_token = self
            .config
            .service_account_email
            .as_ref()
            .map(|email| OidcToken {
                service_account_email: email.clone(),
                audience: url.clone(),
            });

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Ok(CreateTaskRequest {
            task: CloudTask {
                http_request: HttpRequest {
                    url,
                    http_method: "POST",
                    headers,
                    body: base64::engine::general_purpose::STANDARD.encode(body),
                    oidc_token,
                },
            },
        })
    }
}

#[async_trait]
impl WorkQueue for CloudTasksQueue {
    fn name(&self) -> &str {
        &self.config.queue_name
    }

    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let request = self.create_task_request(job)?;
        let access_token = self
            .tokens
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| QueueError::configuration(e.to_string()))?;
        let api_url = format!(
            "{}/{}/tasks",
            self.config.api_endpoint.trim_end_matches('/'),
            self.config.queue_path()
        );

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| QueueError::transport(format!("Cloud Tasks API request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(queue = %self.config.queue_name, job = job.kind(), "task created");
            return Ok(());
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = match serde_json::from_str::<CloudTasksErrorResponse>(&error_body) {
            Ok(e) => format!("{} ({})", e.error.message, e.error.status),
            Err(_) => error_body,
        };
        Err(QueueError::api(status.as_u16(), message))
    }
}
