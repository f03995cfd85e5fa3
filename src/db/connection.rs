// db/connection.rs
// Connection parameters and the supported database kinds.

use crate::error::{ExportError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Postgres,
    MySql,
    Sqlite,
}

impl DbKind {
    pub const ALL: [DbKind; 3] = [DbKind::Postgres, DbKind::MySql, DbKind::Sqlite];

    pub fn default_port(self) -> Option<u16> {
        match self {
            DbKind::Postgres => Some(5432),
            DbKind::MySql => Some(3306),
            DbKind::Sqlite => None,
        }
    }
}

impl FromStr for DbKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DbKind::Postgres),
            "mysql" | "mariadb" => Ok(DbKind::MySql),
            "sqlite" => Ok(DbKind::Sqlite),
            _ => Err(ExportError::UnsupportedDatabase(s.to_string())),
        }
    }
}

impl fmt::Display for DbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DbKind::Postgres => "postgres",
            DbKind::MySql => "mysql",
            DbKind::Sqlite => "sqlite",
        })
    }
}

/// Everything needed to open one session.
///
/// Either `connection_string` is set, or the individual parts are used. For SQLite,
/// `dbname` is the database file path.
#[derive(Clone, Default)]
pub struct ConnectionParams {
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    pub connection_string: Option<String>,
}

impl ConnectionParams {
    /// Checks that the parts required by `kind` are present.
    pub fn validate(&self, kind: DbKind) -> Result<()> {
        if self.connection_string.as_deref().is_some_and(|s| !s.is_empty()) {
            return Ok(());
        }
        let mut missing = Vec::new();
        if self.dbname.is_empty() {
            missing.push("dbname");
        }
        if kind != DbKind::Sqlite {
            if self.host.is_empty() {
                missing.push("host");
            }
            if self.user.is_empty() {
                missing.push("user");
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExportError::InvalidConfig(format!(
                "missing connection parameter(s) for {}: {}",
                kind,
                missing.join(", ")
            )))
        }
    }

    /// Human readable target, never including the password.
    pub fn describe(&self, kind: DbKind) -> String {
        if self.connection_string.is_some() {
            return "[REDACTED connection string]".to_string();
        }
        match kind {
            DbKind::Sqlite => format!("sqlite file {}", self.dbname),
            _ => format!(
                "{}@{}:{}/{}",
                self.user,
                self.host,
                self.port.or(kind.default_port()).unwrap_or_default(),
                self.dbname
            ),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connection_string", &self.connection_string.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            dbname: "computer".into(),
            user: "postgres".into(),
            password: "secret".into(),
            host: "localhost".into(),
            port: Some(5432),
            connection_string: None,
        }
    }

    #[test]
    fn parses_db_kinds() {
        assert_eq!("PostgreSQL".parse::<DbKind>().unwrap(), DbKind::Postgres);
        assert_eq!("mariadb".parse::<DbKind>().unwrap(), DbKind::MySql);
        assert_eq!("sqlite".parse::<DbKind>().unwrap(), DbKind::Sqlite);
        assert!(matches!(
            "oracle".parse::<DbKind>(),
            Err(ExportError::UnsupportedDatabase(_))
        ));
    }

    #[test]
    fn validate_reports_missing_parts() {
        assert!(params().validate(DbKind::Postgres).is_ok());

        let mut p = params();
        p.host.clear();
        p.user.clear();
        let err = p.validate(DbKind::Postgres).unwrap_err().to_string();
        assert!(err.contains("host"), "{err}");
        assert!(err.contains("user"), "{err}");

        let sqlite = ConnectionParams { dbname: "data.db".into(), ..Default::default() };
        assert!(sqlite.validate(DbKind::Sqlite).is_ok());

        let url = ConnectionParams {
            connection_string: Some("postgres://u:p@h/db".into()),
            ..Default::default()
        };
        assert!(url.validate(DbKind::Postgres).is_ok());
    }

    #[test]
    fn password_never_printed() {
        let p = params();
        assert!(!format!("{:?}", p).contains("secret"));
        assert_eq!(p.describe(DbKind::Postgres), "postgres@localhost:5432/computer");
    }
}
