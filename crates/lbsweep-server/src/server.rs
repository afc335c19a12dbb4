use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use lbsweep_compute::{
    ComputeClient, ComputeClientConfig, DynCompute, DynTokenSource, GcpTokenSource,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, QueueBackend};
use crate::dispatch::{
    CloudTasksConfig, CloudTasksQueue, DynQueue, LocalQueue, LocalQueueConsumer,
};
use crate::worker::JobRunner;
use crate::{handlers, metrics};

/// Header Cloud Tasks sets on every delivery.
const TASK_NAME_HEADER: &str = "x-cloudtasks-taskname";

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub compute: DynCompute,
    pub queue: DynQueue,
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(config: AppConfig, compute: DynCompute, queue: DynQueue) -> Self {
        let runner = Arc::new(JobRunner::new(
            compute.clone(),
            queue.clone(),
            config.sweep.dry_run,
        ));
        Self {
            config: Arc::new(config),
            compute,
            queue,
            runner,
        }
    }
}

pub struct LbsweepServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let timeout = state.config.request_timeout();
    Router::new()
        // Health and metrics
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        // Cron triggers arrive as GET
        .route(
            "/job/forwarding-rules/check",
            get(handlers::check_forwarding_rules).post(handlers::check_forwarding_rules),
        )
        .route(
            "/job/firewall-rules/check",
            get(handlers::check_firewall_rules).post(handlers::check_firewall_rules),
        )
        // Queue deliveries
        .route("/jobs", post(handlers::run_job))
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let task = req
                        .headers()
                        .get(TASK_NAME_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        task = %task
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    compute: Option<DynCompute>,
    queue: Option<DynQueue>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            compute: None,
            queue: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses the given backend instead of the Compute Engine REST client.
    pub fn with_compute(mut self, compute: DynCompute) -> Self {
        self.compute = Some(compute);
        self
    }

    /// Uses the given queue instead of the configured backend.
    pub fn with_queue(mut self, queue: DynQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Discovers credentials if anything still needs them, builds the
    /// configured clients and starts the local queue consumer when there is one.
    pub async fn build(self) -> anyhow::Result<LbsweepServer> {
        let needs_credentials = self.compute.is_none()
            || (self.queue.is_none() && self.config.queue.backend == QueueBackend::CloudTasks);

        let mut project_id = self.config.gcp.project_id.clone();
        let tokens: Option<DynTokenSource> = if needs_credentials {
            let source = GcpTokenSource::discover()
                .await
                .context("discovering Google credentials")?;
            if project_id.is_none() {
                project_id = Some(
                    source
                        .project_id()
                        .await
                        .context("gcp.project_id unset and credentials name no project")?,
                );
            }
            Some(Arc::new(source))
        } else {
            None
        };

        let compute: DynCompute = match (self.compute, &tokens, &project_id) {
            (Some(compute), _, _) => compute,
            (None, Some(tokens), Some(project)) => {
                let client_config = ComputeClientConfig::new(project.clone())
                    .with_endpoint(self.config.gcp.compute_endpoint.clone())
                    .with_request_timeout(self.config.gcp_timeout());
                Arc::new(ComputeClient::new(client_config, tokens.clone())?)
            }
            _ => anyhow::bail!("no compute backend configured"),
        };
        tracing::info!(project = compute.project_id(), "compute backend ready");

        let mut consumer: Option<LocalQueueConsumer> = None;
        let queue: DynQueue = match (self.queue, self.config.queue.backend) {
            (Some(queue), _) => queue,
            (None, QueueBackend::Local) => {
                let (queue, local_consumer) = LocalQueue::new(
                    self.config.queue.name.clone(),
                    self.config.queue.max_attempts,
                    self.config.queue.initial_backoff(),
                    self.config.queue.local_workers,
                );
                consumer = Some(local_consumer);
                Arc::new(queue)
            }
            (None, QueueBackend::CloudTasks) => {
                let tokens = tokens.context("Cloud Tasks queue needs credentials")?;
                Arc::new(CloudTasksQueue::new(
                    cloud_tasks_config(&self.config, compute.project_id())?,
                    tokens,
                )?)
            }
        };
        tracing::info!(
            queue = queue.name(),
            backend = %self.config.queue.backend,
            "work queue ready"
        );

        metrics::init_metrics();
        let state = AppState::new(self.config, compute, queue);
        if let Some(consumer) = consumer {
            consumer.start(state.runner.clone());
        }

        Ok(LbsweepServer {
            addr: self.addr,
            app: build_app(state),
        })
    }
}

fn cloud_tasks_config(cfg: &AppConfig, project_id: &str) -> anyhow::Result<CloudTasksConfig> {
    let queue = &cfg.queue;
    let location = queue
        .location
        .clone()
        .context("queue.location is required for Cloud Tasks")?;
    let service_url = queue
        .service_url
        .clone()
        .context("queue.service_url is required for Cloud Tasks")?;

    let mut tasks = CloudTasksConfig::new(project_id, location, queue.name.clone(), service_url)
        .with_request_timeout(cfg.gcp_timeout());
    if let Some(email) = &queue.service_account_email {
        tasks = tasks.with_service_account(email.clone());
    }
    Ok(tasks)
}

impl LbsweepServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
