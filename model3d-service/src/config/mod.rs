use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_env_parsed, Environment};
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;

/// Origins that are always allowed in addition to `CORS_ALLOWED_ORIGINS`.
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://tiniego.com",
    "https://www.tiniego.com",
    "https://dev.tiniego.com",
];

const DEFAULT_TENCENT_ENDPOINT: &str = "ai3d.tencentcloudapi.com";
const DEFAULT_TENCENT_REGION: &str = "ap-guangzhou";

#[derive(Debug, Clone)]
pub struct Model3dConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub supabase: SupabaseConfig,
    pub tencent: TencentConfig,
    pub generation: GenerationConfig,
    pub cors: CorsConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: Secret<String>,
    pub service_key: Secret<String>,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct TencentConfig {
    pub secret_id: Secret<String>,
    pub secret_key: Secret<String>,
    pub region: String,
    /// Host name, or a full base URL when a scheme is included.
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub download_timeout: Duration,
    pub signed_url_ttl_secs: u64,
    /// STL served instead of calling the provider in development.
    pub dev_stl_path: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            download_timeout: Duration::from_secs(60),
            signed_url_ttl_secs: 3600,
            dev_stl_path: PathBuf::from("example.stl"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Model3dConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::current();
        let defaults = GenerationConfig::default();

        Ok(Model3dConfig {
            common: common_config,
            environment,
            supabase: SupabaseConfig {
                url: get_env("SUPABASE_URL", None)?
                    .trim_end_matches('/')
                    .to_string(),
                anon_key: Secret::new(get_env("SUPABASE_ANON_KEY", None)?),
                service_key: Secret::new(get_env("SUPABASE_SERVICE_KEY", None)?),
                bucket: get_env("SUPABASE_BUCKET", Some("memory-photos"))?,
            },
            tencent: TencentConfig {
                secret_id: Secret::new(get_env("TENCENT_SECRET_ID", None)?),
                secret_key: Secret::new(get_env("TENCENT_SECRET_KEY", None)?),
                region: get_env("TENCENT_REGION", Some(DEFAULT_TENCENT_REGION))?,
                endpoint: get_env("TENCENT_AI3D_ENDPOINT", Some(DEFAULT_TENCENT_ENDPOINT))?,
            },
            generation: GenerationConfig {
                poll_interval: Duration::from_secs(get_env_parsed(
                    "GENERATION_POLL_INTERVAL_SECS",
                    defaults.poll_interval.as_secs(),
                )?),
                timeout: Duration::from_secs(get_env_parsed(
                    "GENERATION_TIMEOUT_SECS",
                    defaults.timeout.as_secs(),
                )?),
                download_timeout: Duration::from_secs(get_env_parsed(
                    "DOWNLOAD_TIMEOUT_SECS",
                    defaults.download_timeout.as_secs(),
                )?),
                signed_url_ttl_secs: get_env_parsed(
                    "SIGNED_URL_TTL_SECS",
                    defaults.signed_url_ttl_secs,
                )?,
                dev_stl_path: PathBuf::from(get_env("DEV_STL_PATH", Some("example.stl"))?),
            },
            cors: CorsConfig {
                allowed_origins: allowed_origins(&get_env(
                    "CORS_ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                )?),
            },
            otlp_endpoint: non_blank(std::env::var("OTLP_ENDPOINT").ok()),
        })
    }
}

/// Unset and whitespace-only values both mean "not configured".
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Merge the comma separated `env_origins` with the built-in defaults,
/// dropping blanks and duplicates while keeping first-seen order.
pub fn allowed_origins(env_origins: &str) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let candidates = env_origins
        .split(',')
        .map(str::trim)
        .chain(DEFAULT_ALLOWED_ORIGINS.iter().copied());

    for origin in candidates {
        if !origin.is_empty() && !merged.iter().any(|o| o == origin) {
            merged.push(origin.to_string());
        }
    }
    merged
}
