// SPDX-License-Identifier: MIT

//! Database access for the SQL tools
//!
//! Wraps an `sqlx` SQLite pool and exposes the three operations the agent
//! needs: list tables, describe tables, run a query and render its rows.

use crate::adk::error::SqlAgentError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use std::str::FromStr;

/// Returned by [`DatabaseManager::execute_query`] for failed or empty results
pub const QUERY_FAILED: &str = "Error: Query failed. Please rewrite your query and try again.";

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Connect to `url` (`sqlite://path.db` or `sqlite::memory:`)
    pub async fn connect(url: &str) -> Result<Self, SqlAgentError> {
        let options = SqliteConnectOptions::from_str(url)?;
        // Each connection to an in-memory database sees its own empty database.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };
        log::info!("Connected to database {}", url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// User table names, sorted
    pub async fn list_tables(&self) -> Result<Vec<String>, SqlAgentError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// `CREATE TABLE` statements for `tables`, separated by blank lines.
    ///
    /// Fails if any table does not exist.
    pub async fn table_info(&self, tables: &[String]) -> Result<String, SqlAgentError> {
        let known = self.list_tables().await?;
        let missing: Vec<&str> = tables
            .iter()
            .filter(|t| !known.contains(t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(SqlAgentError::Other(format!(
                "table_names {:?} not found in database",
                missing
            )));
        }

        let mut statements = Vec::with_capacity(tables.len());
        for table in tables {
            let ddl: String = sqlx::query_scalar(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
            statements.push(ddl.trim().to_string());
        }
        Ok(format!("\n{}\n", statements.join("\n\n")))
    }

    /// Run `sql` and render the rows; errors come back as text.
    ///
    /// An empty result renders as an empty string.
    pub async fn run_no_throw(&self, sql: &str) -> String {
        match sqlx::query(sql).fetch_all(&self.pool).await {
            Ok(rows) => render_rows(&rows),
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Run `sql` for the agent. Empty results count as failures.
    pub async fn execute_query(&self, sql: &str) -> String {
        log::info!("Executing query:\n{}", sql);
        let result = self.run_no_throw(sql).await;

        if result.is_empty() {
            log::warn!("Query execution returned nothing");
            return QUERY_FAILED.to_string();
        }
        if result.starts_with("Error") {
            log::warn!("Query execution failed: {}", result);
        } else {
            log::info!("Query results:\n{}", result);
        }
        result
    }
}

/// Render rows as a pipe table with a header separator line
pub fn render_rows(rows: &[SqliteRow]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let headers: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("|{}|", vec!["---"; headers.len()].join("|")));

    for row in rows {
        let cells: Vec<String> = (0..row.len()).map(|i| render_cell(row, i)).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

fn render_cell(row: &SqliteRow, idx: usize) -> String {
    fn show<T: ToString>(v: Option<T>) -> String {
        v.map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string())
    }

    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return show(v);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return show(v);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return show(v);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return show(v);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return show(v.map(|b| format!("<{} bytes>", b.len())));
    }
    "?".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> DatabaseManager {
        let db = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, revenue REAL)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER)")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO customers (name, revenue) VALUES ('Acme', 120.5), ('Globex', 80.0), ('Initech', NULL)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_list_tables() {
        let db = seeded().await;
        assert_eq!(db.list_tables().await.unwrap(), vec!["customers", "orders"]);
    }

    #[tokio::test]
    async fn test_table_info_returns_ddl() {
        let db = seeded().await;
        let info = db.table_info(&["orders".to_string()]).await.unwrap();
        assert!(info.contains("CREATE TABLE orders"));
        assert!(!info.contains("customers"));
    }

    #[tokio::test]
    async fn test_table_info_unknown_table() {
        let db = seeded().await;
        let err = db
            .table_info(&["customers".to_string(), "ghosts".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghosts"));
    }

    #[tokio::test]
    async fn test_run_renders_table() {
        let db = seeded().await;
        let out = db
            .run_no_throw("SELECT name, revenue FROM customers ORDER BY id")
            .await;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "| name | revenue |");
        assert_eq!(lines[1], "|---|---|");
        assert_eq!(lines[2], "| Acme | 120.5 |");
        assert_eq!(lines[4], "| Initech | NULL |");
    }

    #[tokio::test]
    async fn test_aggregate_renders_integer() {
        let db = seeded().await;
        let out = db.run_no_throw("SELECT COUNT(*) AS n FROM customers").await;
        assert!(out.ends_with("| 3 |"));
    }

    #[tokio::test]
    async fn test_execute_query_error_marker() {
        let db = seeded().await;
        let out = db.execute_query("SELECT nope FROM customers").await;
        assert!(out.starts_with("Error"));
    }

    #[tokio::test]
    async fn test_execute_query_empty_result_is_failure() {
        let db = seeded().await;
        let out = db
            .execute_query("SELECT name FROM customers WHERE revenue > 1000")
            .await;
        assert_eq!(out, QUERY_FAILED);
    }
}
