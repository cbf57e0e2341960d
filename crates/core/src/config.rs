use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `LEAD_CADENCE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Tuning knobs for the sequencing engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Delivery attempts before a job is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

/// Outbound email settings shared by all transports.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Which transport the binary wires up: "log", "smtp", or "api".
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub api: EmailApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_sweep_interval_ms() -> u64 {
    30_000
}
fn default_transport() -> String {
    "log".to_string()
}
fn default_from_email() -> String {
    "hello@leadcadence.io".to_string()
}
fn default_from_name() -> String {
    "LeadCadence".to_string()
}
fn default_smtp_host() -> String {
    "localhost".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_api_base_url() -> String {
    "https://api.sendgrid.com/v3".to_string()
}
fn default_api_timeout_ms() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            smtp: SmtpConfig::default(),
            api: EmailApiConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
        }
    }
}

impl Default for EmailApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            engine: EngineConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("LEAD_CADENCE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
