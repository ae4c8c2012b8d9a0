// SPDX-License-Identifier: MIT

//! SQL tools exposed to the workflow and to tool-calling models

use crate::adk::tool::Tool;
use crate::sql::database::DatabaseManager;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

pub const LIST_TABLES: &str = "sql_db_list_tables";
pub const GET_SCHEMA: &str = "sql_db_schema";
pub const RUN_QUERY: &str = "sql_db_query";

// --- Static schemas ---

static LIST_TABLES_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {}
    })
});

static GET_SCHEMA_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "table_names": {
                "type": "string",
                "description": "A comma-separated list of the table names for which to return the schema. Example input: 'table1, table2, table3'"
            }
        },
        "required": ["table_names"]
    })
});

static RUN_QUERY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "A detailed and correct SQL query"
            }
        },
        "required": ["query"]
    })
});

/// Models send either `"a, b"` or `["a", "b"]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableNames {
    Joined(String),
    List(Vec<String>),
}

impl TableNames {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            TableNames::Joined(s) => s.split(',').map(str::to_string).collect(),
            TableNames::List(v) => v,
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct GetSchemaArgs {
    table_names: TableNames,
}

#[derive(Debug, Deserialize)]
struct RunQueryArgs {
    query: String,
}

pub struct ListTablesTool {
    db: Arc<DatabaseManager>,
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        LIST_TABLES
    }

    fn description(&self) -> &str {
        "Input is an empty string, output is a comma-separated list of tables in the database."
    }

    fn schema(&self) -> &Value {
        &LIST_TABLES_SCHEMA
    }

    async fn execute(&self, _input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let tables = self.db.list_tables().await?;
        Ok(Value::String(tables.join(", ")))
    }
}

pub struct GetSchemaTool {
    db: Arc<DatabaseManager>,
}

#[async_trait]
impl Tool for GetSchemaTool {
    fn name(&self) -> &str {
        GET_SCHEMA
    }

    fn description(&self) -> &str {
        "Input to this tool is a comma-separated list of tables, output is the schema for those tables. \
         Be sure that the tables actually exist by calling sql_db_list_tables first!"
    }

    fn schema(&self) -> &Value {
        &GET_SCHEMA_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let args: GetSchemaArgs = serde_json::from_value(input)?;
        let tables = args.table_names.into_vec();
        if tables.is_empty() {
            return Err("table_names must name at least one table".into());
        }
        Ok(Value::String(self.db.table_info(&tables).await?))
    }
}

pub struct QueryTool {
    db: Arc<DatabaseManager>,
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        RUN_QUERY
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the database and return the results. \
         If the query is not correct, an error message will be returned. \
         If an error is returned, rewrite the query and try again."
    }

    fn schema(&self) -> &Value {
        &RUN_QUERY_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let args: RunQueryArgs = serde_json::from_value(input)?;
        Ok(Value::String(self.db.execute_query(&args.query).await))
    }
}

/// The three tools the workflow drives, by role
#[derive(Clone)]
pub struct SqlToolkit {
    pub list_tables: Arc<dyn Tool>,
    pub get_schema: Arc<dyn Tool>,
    pub run_query: Arc<dyn Tool>,
}

impl SqlToolkit {
    /// Toolkit backed by a real database
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self {
            list_tables: Arc::new(ListTablesTool { db: db.clone() }),
            get_schema: Arc::new(GetSchemaTool { db: db.clone() }),
            run_query: Arc::new(QueryTool { db }),
        }
    }
}
