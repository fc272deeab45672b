use sqlx::sqlite::SqliteConnectOptions;
use std::{collections::HashMap, fs::File, path::Path, str::FromStr};

const IN_MEMORY_URI: &str = "sqlite::memory:";
const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("PORT must be a valid port number, got {0:?}")]
    InvalidPort(String),
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub port: u16,
}

impl Config {
    /// Reads the process environment, falling back to a `.env` file found in
    /// the working directory or one of its parents.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file_vars = env_file_vars(dotenvy::dotenv_iter());
        Self::from_lookup(layered(|name| std::env::var(name).ok(), file_vars))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let port = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            database_uri: required("DB_URI")?,
            database_name: required("DB_NAME")?,
            jwt_secret: required("JWT_SECRET")?,
            port,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_uri == IN_MEMORY_URI
    }

    /// `DB_URI` names a directory; the database file inside it is `DB_NAME.db`.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        if self.is_in_memory() {
            return SqliteConnectOptions::from_str(IN_MEMORY_URI);
        }

        let dir = self
            .database_uri
            .strip_prefix("sqlite://")
            .or_else(|| self.database_uri.strip_prefix("sqlite:"))
            .unwrap_or(&self.database_uri);

        Ok(SqliteConnectOptions::new()
            .filename(Path::new(dir).join(format!("{}.db", self.database_name)))
            .create_if_missing(true))
    }
}

fn env_file_vars(iter: dotenvy::Result<dotenvy::Iter<File>>) -> HashMap<String, String> {
    match iter {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(err) => {
            tracing::debug!(error = %err, "no .env file loaded");
            HashMap::new()
        }
    }
}

// variables already in the process environment win over the file
fn layered(
    process: impl Fn(&str) -> Option<String>,
    file_vars: HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> {
    move |name| process(name).or_else(|| file_vars.get(name).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup(&[
            ("DB_URI", "sqlite://./data"),
            ("DB_NAME", "tasks"),
            ("JWT_SECRET", " s3cret "),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.database_name, "tasks");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.port, 8080);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn port_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[
            ("DB_URI", "sqlite::memory:"),
            ("DB_NAME", "tasks"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.is_in_memory());
    }

    #[test]
    fn missing_or_blank_variables_fail_fast() {
        let err = Config::from_lookup(lookup(&[("DB_URI", "sqlite::memory:"), ("DB_NAME", "x")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let err = Config::from_lookup(lookup(&[
            ("DB_URI", "   "),
            ("DB_NAME", "x"),
            ("JWT_SECRET", "s"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("DB_URI"));
    }

    #[test]
    fn env_file_fills_in_unset_variables() {
        let path = std::env::temp_dir().join(format!("tasklist_api-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "DB_URI=sqlite://./data\nDB_NAME=from_file\nJWT_SECRET=file-secret\n",
        )
        .unwrap();
        let file_vars = env_file_vars(dotenvy::from_path_iter(&path));
        std::fs::remove_file(&path).unwrap();

        let config = Config::from_lookup(layered(
            lookup(&[("JWT_SECRET", "process-secret")]),
            file_vars,
        ))
        .unwrap();

        assert_eq!(config.database_uri, "sqlite://./data");
        assert_eq!(config.database_name, "from_file");
        assert_eq!(config.jwt_secret, "process-secret");
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let missing = std::env::temp_dir().join("tasklist_api-does-not-exist.env");
        assert!(env_file_vars(dotenvy::from_path_iter(&missing)).is_empty());
    }

    #[test]
    fn rejects_bad_port() {
        let err = Config::from_lookup(lookup(&[
            ("DB_URI", "sqlite::memory:"),
            ("DB_NAME", "x"),
            ("JWT_SECRET", "s"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("eighty".into()));
    }

    #[test]
    fn directory_uri_places_database_file_by_name() {
        let config = Config::from_lookup(lookup(&[
            ("DB_URI", "sqlite://./data"),
            ("DB_NAME", "tasks"),
            ("JWT_SECRET", "s"),
        ]))
        .unwrap();

        let options = config.connect_options().unwrap();
        assert_eq!(options.get_filename(), Path::new("./data/tasks.db"));
    }
}
