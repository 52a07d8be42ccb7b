//! Process configuration, read once from the environment at startup.
//!
//! Absent optional values fall back to defaults (logged); present but
//! unparsable values are a [`ConfigError`].

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use natours_auth::PasswordHasher;

const DEV_JWT_SECRET: &str = "natours-dev-secret-change-me";
const DEFAULT_MAIL_FROM: &str = "Natours <hello@natours.io>";
const DATABASE_PASSWORD_PLACEHOLDER: &str = "<DATABASE_PASSWORD>";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set in production")]
    Missing(&'static str),
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Deployment mode. Drives log format, error verbosity and cookie flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// `APP_ENV`, else `NODE_ENV`, else development.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        for var in ["APP_ENV", "NODE_ENV"] {
            if let Some(raw) = lookup(var) {
                return Self::parse(&raw).ok_or_else(|| {
                    ConfigError::invalid(var, &raw, "expected `development` or `production`")
                });
            }
        }
        Ok(Self::Development)
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub from: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: IpAddr,
    pub port: u16,
    /// Externally reachable origin used in mailed links. `None` falls back to the listen address.
    pub public_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expires_in: chrono::Duration,
    pub jwt_cookie_expires_in_days: i64,
    /// Postgres URL with the password already substituted. `None` runs in memory.
    pub database_url: Option<String>,
    pub mail: MailConfig,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub request_timeout: Duration,
    pub bcrypt_cost: u32,
    pub seed_tours_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            public_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expires_in: chrono::Duration::days(90),
            jwt_cookie_expires_in_days: 90,
            database_url: None,
            mail: MailConfig {
                relay_url: None,
                relay_token: None,
                from: DEFAULT_MAIL_FROM.to_string(),
            },
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
            bcrypt_cost: PasswordHasher::DEFAULT_COST,
            seed_tours_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build from an arbitrary key lookup. Used directly by tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let environment = Environment::from_lookup(&lookup)?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let jwt_expires_in = match lookup("JWT_EXPIRES_IN") {
            Some(raw) => {
                let secs = parse_duration_secs(&raw)
                    .ok_or_else(|| ConfigError::invalid("JWT_EXPIRES_IN", &raw, "expected <n>[smhd]"))?;
                let secs = i64::try_from(secs)
                    .map_err(|_| ConfigError::invalid("JWT_EXPIRES_IN", &raw, "too large"))?;
                chrono::Duration::try_seconds(secs)
                    .ok_or_else(|| ConfigError::invalid("JWT_EXPIRES_IN", &raw, "too large"))?
            }
            None => defaults.jwt_expires_in,
        };

        let database_url = lookup("DATABASE").map(|url| match lookup("DATABASE_PASSWORD") {
            Some(password) => url.replace(DATABASE_PASSWORD_PLACEHOLDER, &password),
            None => url,
        });
        if database_url.is_none() {
            tracing::info!("DATABASE not set; using the in-memory document store");
        }

        let bcrypt_cost: u32 = parse_or("BCRYPT_COST", &lookup, defaults.bcrypt_cost)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::invalid(
                "BCRYPT_COST",
                &bcrypt_cost.to_string(),
                "must be between 4 and 31",
            ));
        }

        let public_url = match lookup("PUBLIC_URL") {
            Some(raw) => Some(parse_public_url(&raw)?),
            None => {
                tracing::warn!("PUBLIC_URL not set; mailed links will point at the listen address");
                None
            }
        };

        let rate_limit_max: u32 = parse_or("RATE_LIMIT_MAX", &lookup, defaults.rate_limit_max)?;
        if rate_limit_max == 0 {
            return Err(ConfigError::invalid("RATE_LIMIT_MAX", "0", "must be positive"));
        }

        Ok(Self {
            environment,
            host: parse_or("HOST", &lookup, defaults.host)?,
            port: parse_or("PORT", &lookup, defaults.port)?,
            public_url,
            jwt_secret,
            jwt_expires_in,
            jwt_cookie_expires_in_days: parse_or(
                "JWT_COOKIE_EXPIRES_IN",
                &lookup,
                defaults.jwt_cookie_expires_in_days,
            )?,
            database_url,
            mail: MailConfig {
                relay_url: lookup("MAIL_RELAY_URL"),
                relay_token: lookup("MAIL_RELAY_TOKEN"),
                from: lookup("MAIL_FROM").unwrap_or(defaults.mail.from),
            },
            rate_limit_max,
            rate_limit_window: Duration::from_secs(parse_or(
                "RATE_LIMIT_WINDOW_SECS",
                &lookup,
                defaults.rate_limit_window.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                &lookup,
                defaults.request_timeout.as_secs(),
            )?),
            bcrypt_cost,
            seed_tours_file: lookup("SEED_TOURS_FILE").map(PathBuf::from),
        })
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }

    /// Origin for links sent out of band, without a trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://{}", self.listen_addr()),
        }
    }
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("listen", &self.listen_addr())
            .field("public_url", &self.public_url)
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("database", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("mail_relay", &self.mail.relay_url)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("request_timeout", &self.request_timeout)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

fn parse_or<T>(var: &'static str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(var, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn parse_public_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/');
    let authority = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"));
    match authority {
        Some(rest) if !rest.is_empty() && !rest.contains(['/', '?', '#']) => Ok(url.to_string()),
        _ => Err(ConfigError::invalid("PUBLIC_URL", raw, "expected http(s)://host[:port]")),
    }
}

/// `90d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&raw[..i], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };
    let n: u64 = digits.trim().parse().ok()?;
    let factor = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    n.checked_mul(factor)
}
