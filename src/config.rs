use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HubError;
use crate::poll::PollPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "compound-hub.json";
pub const HMDB_API_KEY_ENV: &str = "HMDB_API_KEY";

pub const PUBCHEM_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
pub const PUBCHEM_RECORD_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/compound";
pub const MASSBANK_BASE_URL: &str = "https://msbi.ipb-halle.de/MassBank-api/records";
pub const MASSBANK_RECORD_URL: &str = "https://massbank.eu/MassBank/RecordDisplay";
pub const HMDB_BASE_URL: &str = "http://35.184.189.38/api/hmdb/metabolites/search/";
pub const HMDB_RECORD_URL: &str = "https://hmdb.ca/metabolites";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub http: HttpSection,
    #[serde(default)]
    pub pubchem: PubchemSection,
    #[serde(default)]
    pub massbank: MassbankSection,
    #[serde(default)]
    pub hmdb: HmdbSection,
    #[serde(default)]
    pub aggregation: AggregationSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HttpSection {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PubchemSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub record_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub poll_max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MassbankSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub record_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub peak_timeout_secs: Option<u64>,
    #[serde(default)]
    pub mass_tolerance: Option<f64>,
    #[serde(default)]
    pub peak_threshold: Option<f64>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HmdbSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub record_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AggregationSection {
    #[serde(default)]
    pub dedupe: Option<bool>,
    #[serde(default)]
    pub dedupe_weight_decimals: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct PubchemSettings {
    pub base_url: String,
    pub record_url: String,
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub poll: PollPolicy,
}

#[derive(Debug, Clone)]
pub struct MassbankSettings {
    pub base_url: String,
    pub record_url: String,
    pub timeout: Duration,
    pub peak_timeout: Duration,
    pub mass_tolerance: f64,
    pub peak_threshold: f64,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone)]
pub struct HmdbSettings {
    pub enabled: bool,
    pub base_url: String,
    pub record_url: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AggregationSettings {
    pub dedupe: bool,
    pub dedupe_weight_decimals: u32,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub server: ServerSettings,
    pub http: HttpSettings,
    pub pubchem: PubchemSettings,
    pub massbank: MassbankSettings,
    pub hmdb: HmdbSettings,
    pub aggregation: AggregationSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HubError> {
        let env_key = std::env::var(HMDB_API_KEY_ENV).ok();
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default(), env_key);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HubError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HubError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config, env_key)
    }

    pub fn resolve_config(
        config: Config,
        env_api_key: Option<String>,
    ) -> Result<ResolvedConfig, HubError> {
        let server = ServerSettings {
            host: config
                .server
                .host
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: config.server.port.unwrap_or(8000),
        };

        let http = HttpSettings {
            user_agent: config
                .http
                .user_agent
                .unwrap_or_else(|| format!("compound-hub/{}", env!("CARGO_PKG_VERSION"))),
            max_retries: config.http.max_retries.unwrap_or(2),
            retry_delay: Duration::from_millis(config.http.retry_delay_ms.unwrap_or(200)),
        };

        let pubchem = PubchemSettings {
            base_url: trim_base(config.pubchem.base_url, PUBCHEM_BASE_URL),
            record_url: trim_base(config.pubchem.record_url, PUBCHEM_RECORD_URL),
            timeout: positive_secs("pubchem.timeout_secs", config.pubchem.timeout_secs, 30)?,
            max_concurrent: positive_limit(
                "pubchem.max_concurrent",
                config.pubchem.max_concurrent,
                5,
            )?,
            poll: PollPolicy::new(
                Duration::from_secs(config.pubchem.poll_interval_secs.unwrap_or(2)),
                match config.pubchem.poll_max_attempts.unwrap_or(5) {
                    0 => {
                        return Err(HubError::InvalidConfig(
                            "pubchem.poll_max_attempts must be at least 1".to_string(),
                        ));
                    }
                    attempts => attempts,
                },
            ),
        };

        let massbank = MassbankSettings {
            base_url: trim_base(config.massbank.base_url, MASSBANK_BASE_URL),
            record_url: trim_base(config.massbank.record_url, MASSBANK_RECORD_URL),
            timeout: positive_secs("massbank.timeout_secs", config.massbank.timeout_secs, 30)?,
            peak_timeout: positive_secs(
                "massbank.peak_timeout_secs",
                config.massbank.peak_timeout_secs,
                120,
            )?,
            mass_tolerance: non_negative(
                "massbank.mass_tolerance",
                config.massbank.mass_tolerance,
                0.1,
            )?,
            peak_threshold: non_negative(
                "massbank.peak_threshold",
                config.massbank.peak_threshold,
                0.01,
            )?,
            max_concurrent: positive_limit(
                "massbank.max_concurrent",
                config.massbank.max_concurrent,
                10,
            )?,
        };

        let hmdb = HmdbSettings {
            enabled: config.hmdb.enabled.unwrap_or(false),
            base_url: config
                .hmdb
                .base_url
                .unwrap_or_else(|| HMDB_BASE_URL.to_string()),
            record_url: trim_base(config.hmdb.record_url, HMDB_RECORD_URL),
            api_key: config
                .hmdb
                .api_key
                .or(env_api_key)
                .filter(|key| !key.trim().is_empty()),
            connect_timeout: positive_secs(
                "hmdb.connect_timeout_secs",
                config.hmdb.connect_timeout_secs,
                10,
            )?,
            timeout: positive_secs("hmdb.timeout_secs", config.hmdb.timeout_secs, 120)?,
        };

        let aggregation = AggregationSettings {
            dedupe: config.aggregation.dedupe.unwrap_or(false),
            dedupe_weight_decimals: config.aggregation.dedupe_weight_decimals.unwrap_or(2),
        };

        Ok(ResolvedConfig {
            server,
            http,
            pubchem,
            massbank,
            hmdb,
            aggregation,
        })
    }
}

fn trim_base(value: Option<String>, default: &str) -> String {
    value
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn positive_secs(field: &str, value: Option<u64>, default: u64) -> Result<Duration, HubError> {
    match value.unwrap_or(default) {
        0 => Err(HubError::InvalidConfig(format!("{field} must be positive"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn positive_limit(field: &str, value: Option<usize>, default: usize) -> Result<usize, HubError> {
    match value.unwrap_or(default) {
        0 => Err(HubError::InvalidConfig(format!("{field} must be at least 1"))),
        limit => Ok(limit),
    }
}

fn non_negative(field: &str, value: Option<f64>, default: f64) -> Result<f64, HubError> {
    let value = value.unwrap_or(default);
    if !value.is_finite() || value < 0.0 {
        return Err(HubError::InvalidConfig(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(value)
}
