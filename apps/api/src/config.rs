use anyhow::{bail, Context, Result};

/// SMTP relay settings. Absent when `SMTP_HOST` is unset, in which case codes are only logged.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres identity store. In-memory when unset.
    pub database_url: Option<String>,
    /// Redis OTP store and session denylist. In-memory when unset.
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub jwt_secret: String,
    pub otp_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub store_timeout_ms: u64,
    pub email_timeout_secs: u64,
    pub smtp: Option<SmtpConfig>,
    pub max_upload_bytes: usize,
    pub allowed_file_types: Vec<String>,
    pub port: u16,
    pub rust_log: String,
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_secret = require_env("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let smtp = match optional_env("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", 587)?,
                username: optional_env("SMTP_USERNAME"),
                password: optional_env("SMTP_PASSWORD"),
                from_address: require_env("SMTP_FROM")?,
                from_name: optional_env("SMTP_FROM_NAME"),
            }),
            None => None,
        };

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: optional_env("LLM_MODEL")
                .unwrap_or_else(|| crate::llm_client::DEFAULT_MODEL.to_string()),
            jwt_secret,
            otp_ttl_secs: require_positive("OTP_TTL_SECS", parse_env("OTP_TTL_SECS", 600)?)?,
            session_ttl_secs: require_positive(
                "SESSION_TTL_SECS",
                parse_env("SESSION_TTL_SECS", 7 * 24 * 60 * 60)?,
            )?,
            store_timeout_ms: parse_env("STORE_TIMEOUT_MS", 3000)?,
            email_timeout_secs: parse_env("EMAIL_TIMEOUT_SECS", 10)?,
            smtp,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            allowed_file_types: parse_file_types(
                &optional_env("ALLOWED_FILE_TYPES").unwrap_or_else(|| "pdf,txt,md".to_string()),
            ),
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

fn require_positive(key: &str, value: i64) -> Result<i64> {
    if value <= 0 {
        bail!("{key} must be a positive number of seconds, got {value}");
    }
    Ok(value)
}

/// Splits a comma-separated extension list, lowercased and without leading dots.
fn parse_file_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
impl Config {
    /// In-memory everything, small upload limit.
    pub fn for_tests() -> Self {
        Config {
            database_url: None,
            redis_url: None,
            s3_bucket: "test-bucket".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            anthropic_api_key: "test".to_string(),
            llm_model: crate::llm_client::DEFAULT_MODEL.to_string(),
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            otp_ttl_secs: 600,
            session_ttl_secs: 7 * 24 * 60 * 60,
            store_timeout_ms: 200,
            email_timeout_secs: 1,
            smtp: None,
            max_upload_bytes: 64 * 1024,
            allowed_file_types: vec!["pdf".into(), "txt".into(), "md".into()],
            port: 0,
            rust_log: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_types_normalizes_entries() {
        assert_eq!(
            parse_file_types(" PDF, .txt,,md "),
            vec!["pdf".to_string(), "txt".to_string(), "md".to_string()]
        );
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("RESUME_API_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_non_positive_ttls_are_rejected() {
        assert_eq!(require_positive("OTP_TTL_SECS", 600).unwrap(), 600);
        for bad in [0, -1, i64::MIN] {
            let err = require_positive("OTP_TTL_SECS", bad).unwrap_err();
            assert!(err.to_string().contains("OTP_TTL_SECS"));
        }
    }
}
