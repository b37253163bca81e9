use std::fmt;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

const DEFAULT_USER: &str = "tommy";
const DEFAULT_PASSWORD: &str = "1234";
const DEFAULT_NAME: &str = "alembic_migrate";
const DEFAULT_HOST: &str = "localhost";

/// Connection settings, read from `DB_USER`, `DB_PASS`, `DB_NAME` and
/// `DB_HOST`. `DATABASE_URL` wins over the composed Postgres URL when set.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub name: String,
    pub host: String,
    pub url_override: Option<String>,
}

impl DbConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            user: get("DB_USER", DEFAULT_USER),
            password: get("DB_PASS", DEFAULT_PASSWORD),
            name: get("DB_NAME", DEFAULT_NAME),
            host: get("DB_HOST", DEFAULT_HOST),
            url_override: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
        }
    }

    pub fn url(&self) -> String {
        match &self.url_override {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}/{}",
                self.user, self.password, self.host, self.name
            ),
        }
    }

    pub async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        let mut opts = ConnectOptions::new(self.url());
        opts.sqlx_logging(true);
        let db = Database::connect(opts).await?;
        info!(backend = ?db.get_database_backend(), target = %self.redacted_url(), "connected");
        Ok(db)
    }

    fn redacted_url(&self) -> String {
        match &self.url_override {
            Some(url) => match url.split_once('@') {
                Some((_, rest)) => format!("***@{rest}"),
                None => url.clone(),
            },
            None => format!("{}@{}/{}", self.user, self.host, self.name),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("url_override", &self.url_override.as_ref().map(|_| "***"))
            .finish()
    }
}
