use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("server.request_timeout_ms must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // GCP validations
        if self.gcp.request_timeout_ms == 0 {
            return Err("gcp.request_timeout_ms must be > 0".into());
        }
        if url::Url::parse(&self.gcp.compute_endpoint).is_err() {
            return Err("gcp.compute_endpoint must be an absolute URL".into());
        }
        // Queue validations
        if self.queue.name.is_empty() {
            return Err("queue.name must not be empty".into());
        }
        if self.queue.max_attempts == 0 {
            return Err("queue.max_attempts must be > 0".into());
        }
        if self.queue.local_workers == 0 {
            return Err("queue.local_workers must be > 0".into());
        }
        if self.queue.backend == QueueBackend::CloudTasks {
            if self.queue.location.as_deref().unwrap_or("").is_empty() {
                return Err("queue.backend=cloud_tasks requires queue.location".into());
            }
            match self.queue.service_url.as_deref() {
                Some(u) if url::Url::parse(u).is_ok() => {}
                _ => {
                    return Err(
                        "queue.backend=cloud_tasks requires an absolute queue.service_url".into(),
                    );
                }
            }
        }
        // Sweep validations
        for (key, value) in [
            ("sweep.forwarding_rule_prefix", &self.sweep.forwarding_rule_prefix),
            ("sweep.proxy_prefix", &self.sweep.proxy_prefix),
            ("sweep.firewall_tag_prefix", &self.sweep.firewall_tag_prefix),
        ] {
            if value.is_empty() {
                return Err(format!("{key} must not be empty"));
            }
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn gcp_timeout(&self) -> Duration {
        Duration::from_millis(self.gcp.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on one request, including a whole check pass.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_ms() -> u64 {
    600_000
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Falls back to the project of the discovered credentials when unset.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_compute_endpoint")]
    pub compute_endpoint: String,
    #[serde(default = "default_gcp_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_compute_endpoint() -> String {
    lbsweep_compute::DEFAULT_ENDPOINT.into()
}
fn default_gcp_timeout_ms() -> u64 {
    30_000
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            compute_endpoint: default_compute_endpoint(),
            request_timeout_ms: default_gcp_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    #[default]
    CloudTasks,
    Local,
}

impl std::fmt::Display for QueueBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloudTasks => write!(f, "cloud_tasks"),
            Self::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// Cloud Tasks location, e.g. `us-central1`.
    #[serde(default)]
    pub location: Option<String>,
    /// Public base URL of this service; tasks are delivered to `{service_url}/jobs`.
    #[serde(default)]
    pub service_url: Option<String>,
    /// Service account used to mint OIDC tokens for task delivery.
    #[serde(default)]
    pub service_account_email: Option<String>,
    /// Local backend only: deliveries per job before it is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Local backend only: first redelivery delay, doubled on each retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Local backend only: jobs run concurrently.
    #[serde(default = "default_local_workers")]
    pub local_workers: usize,
}

fn default_queue_name() -> String {
    "default".into()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_local_workers() -> usize {
    4
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            name: default_queue_name(),
            location: None,
            service_url: None,
            service_account_email: None,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            local_workers: default_local_workers(),
        }
    }
}

impl QueueConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_forwarding_rule_prefix")]
    pub forwarding_rule_prefix: String,
    /// Matches both `k8s-tp-` (HTTP) and `k8s-tps-` (HTTPS) proxies.
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,
    #[serde(default = "default_firewall_tag_prefix")]
    pub firewall_tag_prefix: String,
    /// Log planned deletions instead of enqueuing them.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_forwarding_rule_prefix() -> String {
    "k8s-fw".into()
}
fn default_proxy_prefix() -> String {
    "k8s-tp".into()
}
fn default_firewall_tag_prefix() -> String {
    "gke-".into()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            forwarding_rule_prefix: default_forwarding_rule_prefix(),
            proxy_prefix: default_proxy_prefix(),
            firewall_tag_prefix: default_firewall_tag_prefix(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "lbsweep.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., LBSWEEP__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("LBSWEEP")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
