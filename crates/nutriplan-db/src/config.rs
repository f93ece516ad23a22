use std::env;

/// Where the nutriplan database lives and how many connections to keep.
///
/// `nutriplan` resolves the URL from its own config chain and passes it to
/// [`DbConfig::new`]; [`DbConfig::from_env`] is the fallback used when the
/// db crate is driven on its own.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL, optionally with `?key=value` options.
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/nutriplan";

    /// Pool size unless `NUTRIPLAN_DB_MAX_CONNECTIONS` says otherwise.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// `NUTRIPLAN_DATABASE_URL` and `NUTRIPLAN_DB_MAX_CONNECTIONS`, with
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let database_url = env::var("NUTRIPLAN_DATABASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        let max_connections = env::var("NUTRIPLAN_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(Self::DEFAULT_MAX_CONNECTIONS);
        Self {
            database_url,
            max_connections,
        }
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Split the URL into everything up to the database name, the name, and
    /// the query string (with its `?`).
    fn parts(&self) -> (&str, &str, &str) {
        let (base, query) = match self.database_url.find('?') {
            Some(q) => self.database_url.split_at(q),
            None => (self.database_url.as_str(), ""),
        };
        match base.rfind('/') {
            Some(pos) => (&base[..pos], &base[pos + 1..], query),
            None => (base, "", query),
        }
    }

    /// The database name, ignoring connection options.
    pub fn database_name(&self) -> Option<&str> {
        let (_, name, _) = self.parts();
        Some(name).filter(|n| !n.is_empty())
    }

    /// The same server's `postgres` database, keeping connection options
    /// such as `sslmode`. `db-init` connects here to run `CREATE DATABASE`.
    pub fn maintenance_url(&self) -> String {
        match self.parts() {
            (root, _, query) if self.database_url.contains('/') => {
                format!("{root}/postgres{query}")
            }
            _ => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_names_nutriplan() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL);
        assert_eq!(cfg.database_name(), Some("nutriplan"));
        assert_eq!(cfg.max_connections, DbConfig::DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn maintenance_url_swaps_database() {
        let cfg = DbConfig::new("postgresql://localhost:5432/nutriplan");
        assert_eq!(cfg.maintenance_url(), "postgresql://localhost:5432/postgres");
    }

    #[test]
    fn connection_options_are_kept_apart_from_the_name() {
        let cfg = DbConfig::new("postgres://app:pw@db.internal:6543/meals?sslmode=require");
        assert_eq!(cfg.database_name(), Some("meals"));
        assert_eq!(
            cfg.maintenance_url(),
            "postgres://app:pw@db.internal:6543/postgres?sslmode=require"
        );
    }

    #[test]
    fn missing_database_name() {
        assert_eq!(DbConfig::new("postgresql://localhost:5432/").database_name(), None);
        assert_eq!(
            DbConfig::new("postgresql://localhost:5432/?sslmode=disable").database_name(),
            None
        );
    }
}
