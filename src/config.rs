use serde::{Deserialize, Serialize};

/// Main configuration structure loaded from change_metis.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub mailer: MailerConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Narrative generator (OpenAI-compatible chat completions) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// When false every strategy is built from templates
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on the single outbound call; no retries follow a timeout
    pub timeout_ms: u64,
    /// Only ever read from OPENAI_API_KEY
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_ms: 30_000,
            api_key: None,
        }
    }
}

/// Email hand-off. With no endpoint, results are never forwarded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailerConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 10_000,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub http_bind: std::net::SocketAddr,
    /// Bearer token the mailer webhook expects, if any
    pub mailer_token: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "change_metis=info,tower_http=info".to_string(),
            http_bind: std::net::SocketAddr::from(([127, 0, 0, 1], 8787)),
            mailer_token: None,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Ok(level) = std::env::var("RUST_LOG")
            && !level.trim().is_empty()
        {
            cfg.log_level = level;
        }
        if let Ok(v) = std::env::var("CM_HTTP_BIND") {
            cfg.http_bind = v
                .parse()
                .map_err(|e| anyhow::anyhow!("CM_HTTP_BIND '{}' is not a socket address: {}", v, e))?;
        }
        cfg.mailer_token = std::env::var("CM_MAILER_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Ok(cfg)
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses CHANGE_METIS_CONFIG environment variable or defaults to "change_metis.toml"
    pub fn load() -> anyhow::Result<Self> {
        // CM_ENV_FILE if set, otherwise ./.env
        if let Ok(env_path) = std::env::var("CM_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::dotenv();
        }

        let config_path = std::env::var("CHANGE_METIS_CONFIG")
            .unwrap_or_else(|_| "change_metis.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides()?;
        config.runtime = RuntimeConfig::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.generator.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(url) = std::env::var("CM_GENERATOR_BASE_URL") {
            self.generator.base_url = url;
        }
        if let Ok(model) = std::env::var("CM_GENERATOR_MODEL") {
            self.generator.model = model;
        }
        if let Ok(v) = std::env::var("CM_GENERATOR_TIMEOUT_MS") {
            self.generator.timeout_ms = v
                .parse()
                .map_err(|_| anyhow::anyhow!("CM_GENERATOR_TIMEOUT_MS must be an integer, got '{}'", v))?;
        }
        if let Ok(enabled) = std::env::var("CM_GENERATOR_ENABLED") {
            if enabled == "0" || enabled.eq_ignore_ascii_case("false") {
                self.generator.enabled = false;
            } else if enabled == "1" || enabled.eq_ignore_ascii_case("true") {
                self.generator.enabled = true;
            }
        }
        if let Ok(endpoint) = std::env::var("CM_MAILER_ENDPOINT") {
            self.mailer.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let g = &self.generator;
        if g.timeout_ms == 0 {
            anyhow::bail!("generator.timeout_ms must be > 0");
        }
        if !(0.0..=2.0).contains(&g.temperature) {
            anyhow::bail!("generator.temperature must be between 0.0 and 2.0");
        }
        if g.max_tokens == 0 {
            anyhow::bail!("generator.max_tokens must be > 0");
        }
        if g.enabled && g.base_url.trim().is_empty() {
            anyhow::bail!("generator.base_url must be set when the generator is enabled");
        }
        if let Some(endpoint) = &self.mailer.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            anyhow::bail!("mailer.endpoint must be an http(s) URL");
        }
        if self.mailer.timeout_ms == 0 {
            anyhow::bail!("mailer.timeout_ms must be > 0");
        }
        Ok(())
    }
}
