use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use sqlx::postgres::PgConnectOptions;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";
pub const DEFAULT_SQLITE_PATH: &str = "users.db";
const DEFAULT_POSTGRES_PORT: u16 = 5432;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Where users are persisted.
///
/// Postgres settings are kept as parsed connect options so credentials are
/// never re-serialized into a url, and `Debug` only shows where we connect.
#[derive(Clone)]
pub enum DatabaseConfig {
    Postgres(PgConnectOptions),
    Sqlite { url: String },
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseConfig::Postgres(options) => f
                .debug_struct("Postgres")
                .field("host", &options.get_host())
                .field("port", &options.get_port())
                .field("username", &options.get_username())
                .field("database", &options.get_database())
                .finish_non_exhaustive(),
            DatabaseConfig::Sqlite { url } => f.debug_struct("Sqlite").field("url", url).finish(),
        }
    }
}

impl DatabaseConfig {
    pub fn backend(&self) -> &'static str {
        match self {
            DatabaseConfig::Postgres(_) => "postgres",
            DatabaseConfig::Sqlite { .. } => "sqlite",
        }
    }

    fn from_url(url: String) -> Result<Self, ConfigError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let options = url.parse::<PgConnectOptions>().map_err(|e| ConfigError::Invalid {
                key: "DATABASE_URL",
                message: e.to_string(),
            })?;
            Ok(Self::Postgres(options))
        } else if url.starts_with("sqlite:") {
            Ok(Self::Sqlite { url })
        } else {
            Err(ConfigError::Invalid {
                key: "DATABASE_URL",
                message: "expected a postgres:// or sqlite: url".into(),
            })
        }
    }

    fn sqlite_file(path: &str) -> Self {
        Self::Sqlite {
            url: format!("sqlite://{}?mode=rwc", path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub phone_number: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub openai: OpenAiConfig,
    pub twilio: TwilioConfig,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let openai = OpenAiConfig {
            api_key: SecretString::from(require("OPENAI_API_KEY")?),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
            base_url: trim_base(get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())),
        };

        let twilio = TwilioConfig {
            account_sid: require("TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(require("TWILIO_AUTH_TOKEN")?),
            phone_number: require("TWILIO_PHONE_NUMBER")?,
            base_url: trim_base(get("TWILIO_BASE_URL").unwrap_or_else(|| DEFAULT_TWILIO_BASE_URL.into())),
        };

        let database = database_from(&get)?;

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "HTTP_TIMEOUT_SECS",
                        message: format!("expected a positive integer, got {:?}", v),
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            database,
            openai,
            twilio,
            http_timeout,
        })
    }
}

// DATABASE_URL wins, then a complete set of POSTGRES_* parts, then the local sqlite file.
fn database_from<G>(get: &G) -> Result<DatabaseConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(url) = get("DATABASE_URL") {
        return DatabaseConfig::from_url(url);
    }

    let host = get("POSTGRES_HOST");
    let user = get("POSTGRES_USER");
    let name = get("POSTGRES_DATABASE");
    let password = get("POSTGRES_PASSWORD");

    match (host, user, name) {
        (Some(host), Some(user), Some(name)) => {
            let port = match get("POSTGRES_PORT") {
                Some(p) => p.parse::<u16>().map_err(|e| ConfigError::Invalid {
                    key: "POSTGRES_PORT",
                    message: e.to_string(),
                })?,
                None => DEFAULT_POSTGRES_PORT,
            };
            let mut options = PgConnectOptions::new()
                .host(&host)
                .port(port)
                .username(&user)
                .database(&name);
            if let Some(password) = password {
                options = options.password(&password);
            }
            Ok(DatabaseConfig::Postgres(options))
        }
        (None, None, None) => {
            if password.is_some() {
                return Err(ConfigError::Missing("POSTGRES_HOST"));
            }
            let path = get("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.into());
            Ok(DatabaseConfig::sqlite_file(&path))
        }
        (host, user, _) => Err(ConfigError::Missing(if host.is_none() {
            "POSTGRES_HOST"
        } else if user.is_none() {
            "POSTGRES_USER"
        } else {
            "POSTGRES_DATABASE"
        })),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
