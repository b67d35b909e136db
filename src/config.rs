use std::env;
use std::time::Duration;

/// Where uploaded photos are written.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Photos on local disk, served by this process under `/uploads`.
    Local { dir: String },
    /// Photos PUT to an S3-compatible bucket gateway and served from its public URL.
    Bucket {
        endpoint: String,
        bucket: String,
        token: Option<String>,
        public_url: String,
    },
}

/// Requests-per-minute for each rate limit tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Page creation (photo uploads + gateway call).
    pub intake_rpm: u32,
    /// Page lookups and health checks.
    pub standard_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            intake_rpm: 10,
            standard_rpm: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Public base URL used to build shareable page links.
    pub base_url: String,
    pub storage: StorageConfig,
    pub abacatepay_api_key: Option<String>,
    pub abacatepay_api_url: String,
    pub abacatepay_webhook_secret: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub intake_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

/// Reads an env var, treating blank values as unset.
fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("APP_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = parse_or("PORT", 3000);

        let base_url = non_empty("BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageConfig::Local {
                dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            },
            "bucket" | "r2" | "s3" => StorageConfig::Bucket {
                endpoint: non_empty("BUCKET_ENDPOINT")
                    .ok_or("BUCKET_ENDPOINT is required for bucket storage")?,
                bucket: non_empty("BUCKET_NAME")
                    .ok_or("BUCKET_NAME is required for bucket storage")?,
                token: non_empty("BUCKET_TOKEN"),
                public_url: non_empty("BUCKET_PUBLIC_URL")
                    .ok_or("BUCKET_PUBLIC_URL is required for bucket storage")?,
            },
            other => return Err(format!("Unknown STORAGE_BACKEND: {}", other)),
        };

        let rate_limit = RateLimitConfig {
            intake_rpm: parse_or("RATE_LIMIT_INTAKE_RPM", 10u32).max(1),
            standard_rpm: parse_or("RATE_LIMIT_STANDARD_RPM", 60u32).max(1),
        };

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "pages.db".to_string()),
            base_url,
            storage,
            abacatepay_api_key: non_empty("ABACATEPAY_API_KEY"),
            abacatepay_api_url: non_empty("ABACATEPAY_API_URL")
                .unwrap_or_else(|| crate::payments::DEFAULT_API_URL.to_string()),
            abacatepay_webhook_secret: non_empty("ABACATEPAY_WEBHOOK_SECRET"),
            resend_api_key: non_empty("RESEND_API_KEY"),
            email_from: non_empty("EMAIL_FROM")
                .unwrap_or_else(|| crate::email::DEFAULT_FROM.to_string()),
            intake_timeout: Duration::from_secs(parse_or("INTAKE_TIMEOUT_SECS", 30u64).max(1)),
            rate_limit,
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
