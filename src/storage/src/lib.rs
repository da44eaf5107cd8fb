//! SQL-backed collaborators for the label executor: collections are tables,
//! raw queries run against the same pool.

use std::{fs::File, path::Path, str::FromStr, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::config::StorageConfig;
use labels::{RawQuery, Repository, RepositoryLookup, Row};
use sqlx::{any::AnyConnectOptions, AnyPool, ConnectOptions as _};
use tracing::debug;

pub mod filter;
mod row;
mod table;

pub use table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mysql,
}

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

pub async fn connect(config: &StorageConfig) -> Result<Database> {
    sqlx::any::install_default_drivers();
    let (opt, dialect) = match config {
        StorageConfig::Sqlite(sqlite) => {
            let path = Path::new(&sqlite.path);
            if !path.exists() {
                File::create(path)?;
            }
            let opt = AnyConnectOptions::from_str(&format!("sqlite://{}", sqlite.path))?
                .disable_statement_logging();
            (opt, Dialect::Sqlite)
        }
        StorageConfig::Mysql(mysql) => {
            let opt = AnyConnectOptions::from_str(&format!(
                "mysql://{}:{}@{}:{}/{}",
                mysql.username, mysql.password, mysql.host, mysql.port, mysql.db_name
            ))?
            .disable_statement_logging();
            (opt, Dialect::Mysql)
        }
    };

    let pool = AnyPool::connect_with(opt).await?;
    Ok(Database::new(pool, dialect))
}

impl Database {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }
}

#[async_trait]
impl RepositoryLookup for Database {
    async fn get_repository(&self, name: &str) -> Result<Option<Arc<dyn Repository>>> {
        if filter::quote_identifier(name).is_err() {
            return Ok(None);
        }
        let sql = match self.dialect {
            Dialect::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?"
            }
            Dialect::Mysql => {
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?"
            }
        };
        let count: i64 = sqlx::query_scalar(sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            return Ok(None);
        }

        Ok(Some(Arc::new(Table {
            pool: self.pool.clone(),
            dialect: self.dialect,
            name: name.to_owned(),
        })))
    }
}

#[async_trait]
impl RawQuery for Database {
    async fn select(&self, statement: &str) -> Result<Vec<Row>> {
        let statement = read_only(statement, self.dialect)?;
        debug!("{}", statement);
        let rows = sqlx::query(statement).fetch_all(&self.pool).await?;
        rows.iter().map(row::decode_row).collect()
    }
}

/// Accepts a single `SELECT` or `WITH` statement, without its trailing `;`.
/// A `;` inside a string literal, a quoted identifier or a comment does not
/// end the statement.
fn read_only(statement: &str, dialect: Dialect) -> Result<&str> {
    let statement = statement
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if separator(statement, dialect).is_some() {
        bail!("only a single statement is allowed");
    }
    let keyword = statement
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if keyword != "select" && keyword != "with" {
        bail!("only SELECT statements are allowed");
    }
    Ok(statement)
}

/// Byte offset of the first `;` that separates statements.
fn separator(sql: &str, dialect: Dialect) -> Option<usize> {
    let bytes = sql.as_bytes();
    // MySQL 字符串里的反斜杠是转义
    let backslash_escapes = dialect == Dialect::Mysql;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return Some(i),
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && backslash_escapes && quote != b'`' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'#' if dialect == Dialect::Mysql => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}
