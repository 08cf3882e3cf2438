/// Configuration management for the API server
///
/// Configuration comes from environment variables, with a `.env` file picked
/// up in development.
///
/// # Environment Variables
///
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:5000`)
/// - `APP_ENV` (or `NODE_ENV`): `development`, `production` or `test`
/// - `DATABASE_URL`: PostgreSQL URL; when unset it is assembled from
///   `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME`
/// - `DB_CONNECTION_LIMIT`: pool size (default 10)
/// - `RUN_MIGRATIONS`: apply embedded migrations on startup (default true)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `JWT_EXPIRES_IN_HOURS`: access token lifetime (default 24)
/// - `CORS_ORIGINS`: comma separated origins, `*` for any
/// - `RATE_LIMIT_PER_MINUTE`: per-client budget on auth and contact routes
/// - `TRUST_PROXY`: key rate limits on `X-Forwarded-For` (default false)
/// - `ADMIN_EMAIL` / `ADMIN_PASSWORD` / `ADMIN_NAME`: bootstrap admin account
/// - `RUST_LOG`: log filter
///
/// # Example
///
/// ```no_run
/// use portal_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::{env, fmt, str::FromStr};

/// Shortest accepted `JWT_SECRET`
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => anyhow::bail!("Unknown environment: {}", other),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,

    /// Admin account created on startup when it doesn't exist yet
    pub bootstrap_admin: Option<AdminBootstrap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Apply pending migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    /// Access token lifetime in hours
    pub access_token_hours: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per minute per client on rate-limited routes
    pub requests_per_minute: u32,

    /// Take the client address from `X-Forwarded-For`; only safe behind a
    /// proxy that overwrites the header
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or too short, or if a
    /// variable has an unparsable value.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            Some(name) => name.parse()?,
            None => Environment::Development,
        };

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 5000u16)?;

        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = parse_or(&lookup, "DB_PORT", 5432u16)?;
                let user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
                let password = lookup("DB_PASSWORD").unwrap_or_default();
                let name = lookup("DB_NAME").unwrap_or_else(|| "business_portal".to_string());

                if password.is_empty() {
                    format!("postgres://{user}@{host}:{port}/{name}")
                } else {
                    format!("postgres://{user}:{password}@{host}:{port}/{name}")
                }
            }
        };

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }

        let access_token_hours = parse_or(&lookup, "JWT_EXPIRES_IN_HOURS", 24i64)?;
        if access_token_hours <= 0 {
            anyhow::bail!("JWT_EXPIRES_IN_HOURS must be positive");
        }

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| match environment {
                Environment::Production => Vec::new(),
                _ => vec!["*".to_string()],
            });

        let bootstrap_admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: lookup("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                environment,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&lookup, "DB_CONNECTION_LIMIT", 10u32)?,
                run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_token_hours,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 100u32)?,
                trust_proxy: parse_or(&lookup, "TRUST_PROXY", false)?,
            },
            bootstrap_admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn is_production(&self) -> bool {
        self.api.environment == Environment::Production
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt.access_token_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.api.environment, Environment::Development);
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.database.url, "postgres://postgres@localhost:5432/business_portal");
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
        assert_eq!(config.access_token_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.rate_limit.requests_per_minute, 100);
        assert!(!config.rate_limit.trust_proxy);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_database_url_from_parts() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("DB_HOST", "db"),
            ("DB_PORT", "6543"),
            ("DB_USER", "portal"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_NAME", "portal"),
            ("DB_CONNECTION_LIMIT", "25"),
        ])
        .unwrap();

        assert_eq!(config.database.url, "postgres://portal:s3cret@db:6543/portal");
        assert_eq!(config.database.max_connections, 25);
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgres://a@b/c"),
            ("DB_HOST", "ignored"),
        ])
        .unwrap();

        assert_eq!(config.database.url, "postgres://a@b/c");
    }

    #[test]
    fn test_node_env_fallback() {
        let config = load(&[("JWT_SECRET", SECRET), ("NODE_ENV", "production")]).unwrap();
        assert!(config.is_production());
        assert!(config.api.cors_origins.is_empty());

        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("APP_ENV", "test"),
            ("NODE_ENV", "production"),
        ])
        .unwrap();
        assert_eq!(config.api.environment, Environment::Test);
    }

    #[test]
    fn test_cors_origins_parsing() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("CORS_ORIGINS", "https://portal.example.com, http://localhost:3000,"),
        ])
        .unwrap();

        assert_eq!(
            config.api.cors_origins,
            vec![
                "https://portal.example.com".to_string(),
                "http://localhost:3000".to_string()
            ]
        );
    }

    #[test]
    fn test_jwt_secret_required_and_long() {
        assert!(load(&[]).is_err());
        assert!(load(&[("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("JWT_SECRET", SECRET), ("PORT", "http")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("APP_ENV", "staging")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("JWT_EXPIRES_IN_HOURS", "0")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("TRUST_PROXY", "yes")]).is_err());
    }

    #[test]
    fn test_bootstrap_admin() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "Sup3rSecret"),
        ])
        .unwrap();

        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.email, "root@example.com");
        assert_eq!(admin.name, "Administrator");
    }
}
