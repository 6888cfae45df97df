use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local; accounts are lost on restart
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_storage")]
    pub storage: StorageBackend,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Postgres
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "authgate".to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server-level connection, for creating databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT signing settings; one secret and TTL per token class
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_ttl: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_ttl: i64,  // seconds (e.g., 604800 for 7 days)
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Accept placeholder secrets; never set in production
    #[serde(default)]
    pub allow_development_secrets: bool,
}

fn default_issuer() -> String {
    "authgate".to_string()
}

/// `requests` tokens per `period_secs`
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketSettings {
    pub requests: u32,
    pub period_secs: u64,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitSettings {
    #[serde(default = "default_login_limit")]
    pub login: BucketSettings,
    #[serde(default = "default_register_limit")]
    pub register: BucketSettings,
    #[serde(default = "default_refresh_limit")]
    pub refresh: BucketSettings,
}

fn default_login_limit() -> BucketSettings {
    BucketSettings { requests: 5, period_secs: 60 }
}

fn default_register_limit() -> BucketSettings {
    BucketSettings { requests: 3, period_secs: 3600 }
}

fn default_refresh_limit() -> BucketSettings {
    BucketSettings { requests: 10, period_secs: 60 }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            login: default_login_limit(),
            register: default_register_limit(),
            refresh: default_refresh_limit(),
        }
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug)]
pub struct PasswordSettings {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Load `configuration.{yaml,toml,json}` from the working directory, then
/// apply `APP__SECTION__KEY` environment overrides
/// (e.g. `APP__JWT__ACCESS_SECRET`).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    Ok(settings.try_deserialize::<Settings>()?)
}
