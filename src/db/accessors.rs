// db/accessors.rs
// Database accessor implementations for different database systems.

use super::connection::{ConnectionParams, DbKind};
use super::models::*;
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, Statement, TypeInfo, ValueRef};
use std::fmt::Write;
use std::str::FromStr;
use tracing::debug;

/// One open session against a database.
#[async_trait]
pub trait DataAccessor: Send {
    /// Names of the tables in the target schema, as the catalog reports them.
    async fn list_tables(&mut self) -> Result<Vec<String>>;
    /// Every row of `table`, with column names taken from the statement that read them.
    async fn extract_table(&mut self, table: &str) -> Result<TableData>;
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a session for `kind`. `schema` narrows the catalog for Postgres and MySQL.
pub async fn connect(
    kind: DbKind,
    params: &ConnectionParams,
    schema: Option<&str>,
) -> Result<Box<dyn DataAccessor>> {
    Ok(match kind {
        DbKind::Postgres => Box::new(PostgresAccessor::new(params, schema).await?),
        DbKind::MySql => Box::new(MySqlAccessor::new(params, schema).await?),
        DbKind::Sqlite => Box::new(SqliteAccessor::new(params).await?),
    })
}

/// Wraps `name` in `quote`, doubling any embedded quote character.
pub fn quote_identifier(name: &str, quote: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn build_table<R: Row>(
    table: &str,
    columns: Vec<String>,
    rows: Vec<R>,
    decode: impl Fn(&R, usize) -> std::result::Result<CellValue, sqlx::Error>,
) -> std::result::Result<TableData, sqlx::Error> {
    let values = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| decode(row, i)).collect::<std::result::Result<Vec<_>, _>>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let data = TableData::new(table, columns, values);
    debug!(table, rows = data.records.len(), columns = data.columns.len(), "extracted table");
    Ok(data)
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("\\x");
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn unsigned_cell(n: u64) -> CellValue {
    match i64::try_from(n) {
        Ok(i) => CellValue::Integer(i),
        Err(_) => CellValue::Decimal(Decimal::from(n)),
    }
}

// Exact numeric text that did not fit a Decimal still becomes the nearest float.
fn numeric_from_text(text: &str) -> CellValue {
    if let Ok(d) = Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text)) {
        return CellValue::Decimal(d);
    }
    match text.parse::<f64>() {
        Ok(f) => CellValue::Float(f),
        Err(_) => CellValue::Other(text.to_string()),
    }
}

// ------------------- PostgreSQL -------------------
pub struct PostgresAccessor {
    conn: PgConnection,
    schema: String,
}

impl PostgresAccessor {
    pub async fn new(params: &ConnectionParams, schema: Option<&str>) -> Result<Self> {
        let options = match params.connection_string.as_deref() {
            Some(url) => PgConnectOptions::from_str(url).map_err(ExportError::Connectivity)?,
            None => {
                let mut options = PgConnectOptions::new()
                    .host(&params.host)
                    .username(&params.user)
                    .password(&params.password)
                    .database(&params.dbname);
                if let Some(port) = params.port {
                    options = options.port(port);
                }
                options
            }
        };
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(ExportError::Connectivity)?;
        Ok(Self { conn, schema: schema.unwrap_or("public").to_string() })
    }
}

#[async_trait]
impl DataAccessor for PostgresAccessor {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT table_name::text AS table_name FROM information_schema.tables WHERE table_schema = $1")
            .bind(&self.schema)
            .fetch_all(&mut self.conn)
            .await
            .map_err(ExportError::CatalogQuery)?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("table_name"))
            .collect::<std::result::Result<_, _>>()
            .map_err(ExportError::CatalogQuery)
    }

    async fn extract_table(&mut self, table: &str) -> Result<TableData> {
        let sql = format!("SELECT * FROM {}.{}", quote_identifier(&self.schema, '"'), quote_identifier(table, '"'));
        let map_err = |source| ExportError::ExtractionQuery { table: table.to_string(), source };
        let stmt = (&mut self.conn).prepare(&sql).await.map_err(map_err)?;
        let columns = column_names(stmt.columns());
        let types: Vec<String> = stmt.columns().iter().map(|c| c.type_info().name().to_string()).collect();
        // Simple-query protocol: every value arrives in the server's own text rendering.
        let rows = (&mut self.conn).fetch_all(sqlx::raw_sql(&sql)).await.map_err(map_err)?;
        build_table(table, columns, rows, |row, idx| {
            decode_pg_cell(row, idx, types.get(idx).map(String::as_str).unwrap_or_default())
        })
        .map_err(map_err)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await.map_err(ExportError::Close)
    }
}

fn decode_pg_cell(row: &PgRow, idx: usize, type_name: &str) -> std::result::Result<CellValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(CellValue::Null);
    }
    let text: &str = row.try_get_unchecked(idx)?;
    Ok(pg_text_cell(type_name, text))
}

/// Maps a text-format Postgres value onto a cell. Types without a scalar mapping
/// (dates, intervals, arrays, network types, money, json...) keep the server's text.
fn pg_text_cell(type_name: &str, text: &str) -> CellValue {
    let scalar = match type_name {
        "BOOL" => Some(CellValue::Bool(text == "t")),
        "INT2" | "INT4" | "INT8" | "OID" => text.parse().ok().map(CellValue::Integer),
        "FLOAT4" | "FLOAT8" => text.parse().ok().map(CellValue::Float),
        "NUMERIC" => Some(numeric_from_text(text)),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => Some(CellValue::Text(text.to_string())),
        _ => None,
    };
    scalar.unwrap_or_else(|| CellValue::Other(text.to_string()))
}

// ------------------- MySQL -------------------
pub struct MySqlAccessor {
    conn: MySqlConnection,
    schema: Option<String>,
}

impl MySqlAccessor {
    pub async fn new(params: &ConnectionParams, schema: Option<&str>) -> Result<Self> {
        let options = match params.connection_string.as_deref() {
            Some(url) => MySqlConnectOptions::from_str(url).map_err(ExportError::Connectivity)?,
            None => {
                let mut options = MySqlConnectOptions::new()
                    .host(&params.host)
                    .username(&params.user)
                    .password(&params.password)
                    .database(&params.dbname);
                if let Some(port) = params.port {
                    options = options.port(port);
                }
                options
            }
        };
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(ExportError::Connectivity)?;
        Ok(Self { conn, schema: schema.map(str::to_string) })
    }
}

#[async_trait]
impl DataAccessor for MySqlAccessor {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT table_name AS table_name FROM information_schema.tables WHERE table_schema = COALESCE(?, DATABASE())")
            .bind(self.schema.as_deref())
            .fetch_all(&mut self.conn)
            .await
            .map_err(ExportError::CatalogQuery)?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>(0))
            .collect::<std::result::Result<_, _>>()
            .map_err(ExportError::CatalogQuery)
    }

    async fn extract_table(&mut self, table: &str) -> Result<TableData> {
        let sql = match &self.schema {
            Some(db) => format!("SELECT * FROM {}.{}", quote_identifier(db, '`'), quote_identifier(table, '`')),
            None => format!("SELECT * FROM {}", quote_identifier(table, '`')),
        };
        let map_err = |source| ExportError::ExtractionQuery { table: table.to_string(), source };
        let stmt = (&mut self.conn).prepare(&sql).await.map_err(map_err)?;
        let columns = column_names(stmt.columns());
        let rows = stmt.query().fetch_all(&mut self.conn).await.map_err(map_err)?;
        build_table(table, columns, rows, decode_mysql_cell).map_err(map_err)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await.map_err(ExportError::Close)
    }
}

fn decode_mysql_cell(row: &MySqlRow, idx: usize) -> std::result::Result<CellValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = row.column(idx).type_info().name();
    if type_name.ends_with("UNSIGNED") {
        return Ok(unsigned_cell(row.try_get(idx)?));
    }
    Ok(match type_name {
        "BOOLEAN" => CellValue::Bool(row.try_get(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => CellValue::Integer(row.try_get(idx)?),
        "FLOAT" => CellValue::Float(row.try_get::<f32, _>(idx)?.into()),
        "DOUBLE" => CellValue::Float(row.try_get(idx)?),
        // DECIMAL travels as text on the wire
        "DECIMAL" => match row.try_get::<Decimal, _>(idx) {
            Ok(d) => CellValue::Decimal(d),
            Err(_) => numeric_from_text(row.try_get_unchecked::<&str, _>(idx)?),
        },
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            CellValue::Text(row.try_get_unchecked(idx)?)
        }
        "YEAR" => mysql_year(row.try_get_unchecked(idx)?),
        "BIT" => mysql_bit(row.try_get_unchecked(idx)?),
        "DATE" => CellValue::Other(row.try_get::<NaiveDate, _>(idx)?.to_string()),
        "DATETIME" => CellValue::Other(row.try_get::<NaiveDateTime, _>(idx)?.to_string()),
        "TIMESTAMP" => CellValue::Other(row.try_get::<DateTime<Utc>, _>(idx)?.to_string()),
        "TIME" => {
            let raw: &[u8] = row.try_get_unchecked(idx)?;
            CellValue::Other(mysql_time_text(raw).unwrap_or_else(|| hex_literal(raw)))
        }
        "JSON" => CellValue::Other(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        // BLOB family, GEOMETRY and anything else binary
        _ => CellValue::Other(hex_literal(row.try_get_unchecked::<&[u8], _>(idx)?)),
    })
}

// YEAR is a little-endian u16 in the binary protocol.
fn mysql_year(raw: &[u8]) -> CellValue {
    match raw {
        [lo, hi, ..] => CellValue::Integer(u16::from_le_bytes([*lo, *hi]).into()),
        _ => CellValue::Other(hex_literal(raw)),
    }
}

// BIT(n) arrives as big-endian bytes, at most eight of them.
fn mysql_bit(raw: &[u8]) -> CellValue {
    if raw.len() > 8 {
        return CellValue::Other(hex_literal(raw));
    }
    unsigned_cell(raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Renders a binary-protocol TIME (length byte, sign, days, h, m, s, micros) as `[-]HHH:MM:SS[.ffffff]`.
fn mysql_time_text(raw: &[u8]) -> Option<String> {
    let (&len, body) = raw.split_first()?;
    let body = body.get(..len as usize)?;
    if body.is_empty() {
        return Some("00:00:00".to_string());
    }
    if body.len() < 8 {
        return None;
    }
    let days = u32::from_le_bytes(body[1..5].try_into().ok()?);
    let hours = days * 24 + u32::from(body[5]);
    let sign = if body[0] == 1 { "-" } else { "" };
    let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, body[6], body[7]);
    if let Some(micros) = body.get(8..12) {
        let micros = u32::from_le_bytes(micros.try_into().ok()?);
        if micros > 0 {
            let _ = write!(text, ".{:06}", micros);
        }
    }
    Some(text)
}

// ------------------- SQLite -------------------
pub struct SqliteAccessor {
    conn: SqliteConnection,
}

impl SqliteAccessor {
    pub async fn new(params: &ConnectionParams) -> Result<Self> {
        let options = match params.connection_string.as_deref() {
            Some(url) => SqliteConnectOptions::from_str(url).map_err(ExportError::Connectivity)?,
            None => SqliteConnectOptions::new().filename(&params.dbname),
        };
        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(ExportError::Connectivity)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn from_connection(conn: SqliteConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DataAccessor for SqliteAccessor {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .fetch_all(&mut self.conn)
            .await
            .map_err(ExportError::CatalogQuery)?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("name"))
            .collect::<std::result::Result<_, _>>()
            .map_err(ExportError::CatalogQuery)
    }

    async fn extract_table(&mut self, table: &str) -> Result<TableData> {
        let sql = format!("SELECT * FROM {}", quote_identifier(table, '"'));
        let map_err = |source| ExportError::ExtractionQuery { table: table.to_string(), source };
        let stmt = (&mut self.conn).prepare(&sql).await.map_err(map_err)?;
        let columns = column_names(stmt.columns());
        let rows = stmt.query().fetch_all(&mut self.conn).await.map_err(map_err)?;
        build_table(table, columns, rows, decode_sqlite_cell).map_err(map_err)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await.map_err(ExportError::Close)
    }
}

// SQLite types are per value; the declared column type only matters for BOOLEAN.
fn decode_sqlite_cell(row: &SqliteRow, idx: usize) -> std::result::Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    let declared = row.column(idx).type_info().name();
    Ok(match storage.as_str() {
        "INTEGER" if declared == "BOOLEAN" => CellValue::Bool(row.try_get_unchecked::<i64, _>(idx)? != 0),
        "INTEGER" => CellValue::Integer(row.try_get_unchecked(idx)?),
        "REAL" => CellValue::Float(row.try_get_unchecked(idx)?),
        "TEXT" => CellValue::Text(row.try_get_unchecked(idx)?),
        _ => CellValue::Other(hex_literal(row.try_get_unchecked::<&[u8], _>(idx)?)),
    })
}
