//! Configuration loading for the workflow orchestration service.
//!
//! Layered the way `original_source/config/config.py`'s YAML-plus-env-override
//! singleton does: an optional `config.yaml`/`config.toml` file supplies
//! sections (`mongodb`, `api`, `scheduler`, `logging`, `executor`), and the
//! exact environment variables spec.md §6 names always win over the file.

use serde::Deserialize;

/// Top-level configuration, loaded once at startup by `Config::load`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    pub mongodb: MongoConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    #[serde(default = "default_mongo_host")]
    pub host: String,
    #[serde(default = "default_mongo_port")]
    pub port: u16,
    #[serde(default = "default_mongo_database")]
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl MongoConfig {
    /// Build the `mongodb://` connection URI from the component fields,
    /// matching `original_source/core/state_manager.py`'s own assembly of a
    /// `pymongo.MongoClient` URI from discrete host/port/credentials.
    pub fn connection_uri(&self) -> String {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                format!("mongodb://{u}:{p}@{}:{}/{}", self.host, self.port, self.database)
            }
            _ => format!("mongodb://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_base_url")]
    pub base_url: String,
    /// Offline-testing mode (spec.md §4.2): generates local task ids instead
    /// of calling out. MUST be false in production.
    #[serde(default)]
    pub placeholder_mode: bool,
    #[serde(default = "default_scheduler_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_url: default_scheduler_base_url(),
            placeholder_mode: false,
            timeout_secs: default_scheduler_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_polling_interval_seconds")]
    pub polling_interval_seconds: u64,
    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps_per_workflow: u32,
    #[serde(default = "default_true")]
    pub enable_auto_resume: bool,
    #[serde(default = "default_workflow_log_dir")]
    pub workflow_log_dir: String,
    #[serde(default = "default_true")]
    pub check_output_file_conflicts: bool,
    #[serde(default = "default_max_output_file_attempts")]
    pub max_output_file_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            polling_interval_seconds: default_polling_interval_seconds(),
            max_parallel_steps_per_workflow: default_max_parallel_steps(),
            enable_auto_resume: true,
            workflow_log_dir: default_workflow_log_dir(),
            check_output_file_conflicts: true,
            max_output_file_attempts: default_max_output_file_attempts(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_api_host() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    8080
}
fn default_mongo_host() -> String {
    "localhost".to_string()
}
fn default_mongo_port() -> u16 {
    27017
}
fn default_mongo_database() -> String {
    "workflow_engine".to_string()
}
fn default_scheduler_base_url() -> String {
    "http://localhost:7070".to_string()
}
fn default_scheduler_timeout_secs() -> u64 {
    30
}
fn default_polling_interval_seconds() -> u64 {
    10
}
fn default_max_parallel_steps() -> u32 {
    3
}
fn default_workflow_log_dir() -> String {
    "./logs/workflows".to_string()
}
fn default_max_output_file_attempts() -> u32 {
    100
}
fn default_true() -> bool {
    true
}

/// CLI-supplied overrides (`--config`, `--host`, `--port`, `--log-level`,
/// spec.md §6). These win over the config file but are themselves
/// overridden by the named environment variables, matching the precedence
/// `original_source/config/config.py` documents: file < CLI < env.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from an optional `config.yaml`/`config.toml` plus
    /// the environment variables named in spec.md §6, which always override
    /// the file. Fatal on failure — callers exit non-zero (spec.md §7).
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with(&CliOverrides::default())
    }

    /// Same as [`Config::load`], but first applies CLI overrides before the
    /// environment variables are layered on top.
    pub fn load_with(cli: &CliOverrides) -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config_file_name = cli.config_path.clone().unwrap_or_else(|| "config".to_string());

        let mut builder = config::Config::builder()
            .set_default("mongodb.host", default_mongo_host())?
            .set_default("mongodb.port", default_mongo_port() as i64)?
            .set_default("mongodb.database", default_mongo_database())?
            .add_source(config::File::with_name(&config_file_name).required(cli.config_path.is_some()));

        if let Some(host) = &cli.host {
            builder = builder.set_override("api.host", host.clone())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("api.port", port as i64)?;
        }
        if let Some(level) = &cli.log_level {
            builder = builder.set_override("logging.level", level.clone())?;
        }

        // Exact environment variables named in spec.md §6.
        if let Ok(v) = std::env::var("MONGODB_HOST") {
            builder = builder.set_override("mongodb.host", v)?;
        }
        if let Ok(v) = std::env::var("MONGODB_PORT") {
            builder = builder.set_override("mongodb.port", v)?;
        }
        if let Ok(v) = std::env::var("MONGODB_DATABASE") {
            builder = builder.set_override("mongodb.database", v)?;
        }
        if let Ok(v) = std::env::var("MONGODB_USERNAME") {
            builder = builder.set_override("mongodb.username", v)?;
        }
        if let Ok(v) = std::env::var("MONGODB_PASSWORD") {
            builder = builder.set_override("mongodb.password", v)?;
        }
        if let Ok(v) = std::env::var("API_HOST") {
            builder = builder.set_override("api.host", v)?;
        }
        if let Ok(v) = std::env::var("API_PORT") {
            builder = builder.set_override("api.port", v)?;
        }
        if let Ok(v) = std::env::var("CHECK_OUTPUT_FILE_CONFLICTS") {
            builder = builder.set_override("executor.check_output_file_conflicts", parse_bool(&v))?;
        }
        if let Ok(v) = std::env::var("MAX_OUTPUT_FILE_ATTEMPTS") {
            builder = builder.set_override("executor.max_output_file_attempts", v)?;
        }
        // Ambient vars the executor needs beyond spec.md §6's explicit list.
        if let Ok(v) = std::env::var("POLLING_INTERVAL_SECONDS") {
            builder = builder.set_override("executor.polling_interval_seconds", v)?;
        }
        if let Ok(v) = std::env::var("MAX_PARALLEL_STEPS_PER_WORKFLOW") {
            builder = builder.set_override("executor.max_parallel_steps_per_workflow", v)?;
        }
        if let Ok(v) = std::env::var("ENABLE_AUTO_RESUME") {
            builder = builder.set_override("executor.enable_auto_resume", parse_bool(&v))?;
        }
        if let Ok(v) = std::env::var("WORKFLOW_LOG_DIR") {
            builder = builder.set_override("executor.workflow_log_dir", v)?;
        }
        if let Ok(v) = std::env::var("SCHEDULER_BASE_URL") {
            builder = builder.set_override("scheduler.base_url", v)?;
        }
        if let Ok(v) = std::env::var("SCHEDULER_PLACEHOLDER_MODE") {
            builder = builder.set_override("scheduler.placeholder_mode", parse_bool(&v))?;
        }
        if let Ok(v) = std::env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", v)?;
        }

        builder.build()?.try_deserialize()
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
