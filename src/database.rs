use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};

use crate::access::{Access, Caller, Identity};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sql::engine::Memory;
use crate::sql::execution::ResultSet;
use crate::sql::parser::ast::{Statement, StatementType};
use crate::sql::parser::{self, ParsedStatement};
use crate::sql::plan::Plan;
use crate::sql::schema::{Catalog, Table};
use crate::sql::types::{Row, Value};
use crate::storage::{self, SnapshotKey, State};

/// The outcome of executing a statement, in its JSON wire shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub success: bool,
    /// The statement type, when the statement could be classified.
    #[serde(rename = "type")]
    pub statement_type: Option<StatementType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Wall time in milliseconds.
    pub execution_time: f64,
}

impl ExecuteResult {
    fn from_result_set(result: ResultSet) -> Result<Self> {
        let mut out = ExecuteResult { success: true, ..Default::default() };
        out.changes = result.changes();
        match result {
            ResultSet::Create { last_insert_id, .. } => out.last_insert_id = last_insert_id,
            query @ ResultSet::Query { .. } => {
                if let ResultSet::Query { columns, .. } = &query {
                    out.columns = Some(columns.clone());
                }
                let rows = query.into_rows()?;
                out.row_count = Some(rows.len());
                out.rows = Some(rows);
            },
            _ => {},
        }
        Ok(out)
    }

    fn failure(statement_type: Option<StatementType>, err: &Error) -> Self {
        ExecuteResult { statement_type, error: Some(err.to_string()), ..Default::default() }
    }
}

/// An entry in the query log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    pub sql: String,
    #[serde(rename = "type")]
    pub statement_type: Option<StatementType>,
    pub success: bool,
    pub error: Option<String>,
    pub changes: Option<u64>,
    pub rows: Option<usize>,
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
}

/// State captured by BEGIN, restored by ROLLBACK.
#[derive(Clone, Debug)]
struct Undo {
    store: Memory,
    access: Access,
}

/// An embedded database: relations, access control, a query log and an
/// optional snapshot file. A database is single-owner; callers sharing one
/// across threads must serialize access themselves.
pub struct Database {
    store: Memory,
    access: Access,
    transaction: Option<Undo>,
    query_log: VecDeque<QueryRecord>,
    config: Config,
    key: Option<SnapshotKey>,
}

impl Database {
    /// Creates an empty database.
    pub fn new(config: Config) -> Result<Self> {
        let key = config.key()?;
        Ok(Self {
            store: Memory::new(),
            access: Access::new(),
            transaction: None,
            query_log: VecDeque::new(),
            config,
            key,
        })
    }

    /// Creates an empty in-memory database.
    pub fn in_memory() -> Self {
        Self {
            store: Memory::new(),
            access: Access::new(),
            transaction: None,
            query_log: VecDeque::new(),
            config: Config::in_memory(),
            key: None,
        }
    }

    /// Opens a database, restoring the configured snapshot file if it
    /// exists. A snapshot that fails to load aborts the open.
    pub fn open(config: Config) -> Result<Self> {
        let mut db = Self::new(config)?;
        if let Some(path) = db.config.snapshot_path() {
            if let Some(blob) = storage::read_file(&path)? {
                db.restore(storage::load(&blob, db.key.as_ref())?);
                info!("Loaded {} tables from {}", db.store.table_names().len(), path.display());
            }
        }
        Ok(db)
    }

    /// Restores a database from a snapshot blob.
    pub fn load(blob: &[u8], config: Config) -> Result<Self> {
        let mut db = Self::new(config)?;
        db.restore(storage::load(blob, db.key.as_ref())?);
        Ok(db)
    }

    fn restore(&mut self, state: State) {
        self.store = state.tables;
        self.access = Access::from_parts(state.roles, state.users);
        self.transaction = None;
    }

    /// The last committed state.
    pub fn state(&self) -> State {
        let (store, access) = match &self.transaction {
            Some(undo) => (&undo.store, &undo.access),
            None => (&self.store, &self.access),
        };
        State { tables: store.clone(), roles: access.roles().clone(), users: access.user_records().clone() }
    }

    /// Serializes the last committed state into a snapshot blob.
    pub fn save(&self) -> Result<Vec<u8>> {
        storage::save(&self.state(), self.key.as_ref(), self.config.compress)
    }

    /// Writes a snapshot to the configured file. In-memory databases have
    /// no file and never persist.
    pub fn flush(&self) -> Result<()> {
        match self.config.snapshot_path() {
            Some(path) => storage::write_file(&path, &self.save()?),
            None => Ok(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a statement, reporting failures in the result rather than
    /// as an error.
    pub fn execute(&mut self, sql: &str, params: &[Value], caller: &Caller) -> ExecuteResult {
        let start = Instant::now();
        let (mut result, warnings) = match self.parse(sql, caller) {
            Ok(parsed) => {
                let statement_type = parsed.statement_type();
                let warnings = parsed.validation.warnings.clone();
                let result = self
                    .run(parsed, params, caller)
                    .and_then(ExecuteResult::from_result_set)
                    .unwrap_or_else(|err| ExecuteResult::failure(Some(statement_type), &err));
                (ExecuteResult { statement_type: Some(statement_type), ..result }, warnings)
            },
            Err(err) => (ExecuteResult::failure(parser::classify(sql).ok(), &err), vec![]),
        };
        result.warnings = warnings;
        result.execution_time = start.elapsed().as_secs_f64() * 1000.0;

        match &result.error {
            Some(error) => debug!("Failed {:?} in {:.3}ms: {}", sql, result.execution_time, error),
            None => debug!("Executed {:?} in {:.3}ms", sql, result.execution_time),
        }
        self.log_query(sql, &result);
        result
    }

    /// Executes a statement, returning its raw result set.
    pub fn query(&mut self, sql: &str, params: &[Value], caller: &Caller) -> Result<ResultSet> {
        let parsed = self.parse(sql, caller)?;
        self.run(parsed, params, caller)
    }

    /// Parses a statement. A caller lacking the permission for the statement
    /// type is denied even when the statement does not parse.
    fn parse(&self, sql: &str, caller: &Caller) -> Result<ParsedStatement> {
        parser::parse(sql).map_err(|err| {
            match parser::classify(sql).ok().and_then(|t| t.required_permission()) {
                Some(permission) => self.access.authorize(caller, permission).err().unwrap_or(err),
                None => err,
            }
        })
    }

    fn run(&mut self, parsed: ParsedStatement, params: &[Value], caller: &Caller) -> Result<ResultSet> {
        if let Some(permission) = parsed.statement_type().required_permission() {
            self.access.authorize(caller, permission)?;
        }
        for warning in &parsed.validation.warnings {
            warn!("{}: {}", parsed.sql, warning);
        }
        parsed.validation.check()?;
        if parsed.parameters != params.len() {
            return Err(Error::InvalidParameterCount { expected: parsed.parameters, actual: params.len() });
        }
        if let Some(value) = params.iter().find(|v| matches!(v, Value::Real(f) if !f.is_finite())) {
            return Err(Error::Value(format!("Non-finite parameter {}", value)));
        }

        match parsed.statement {
            Statement::Begin => {
                if self.transaction.is_some() {
                    return Err(Error::Transaction("A transaction is already active".into()));
                }
                self.transaction = Some(Undo { store: self.store.clone(), access: self.access.clone() });
                Ok(ResultSet::Begin)
            },
            Statement::Commit => {
                self.transaction.take().ok_or_else(|| Error::Transaction("No active transaction".into()))?;
                Ok(ResultSet::Commit)
            },
            Statement::Rollback => {
                let undo =
                    self.transaction.take().ok_or_else(|| Error::Transaction("No active transaction".into()))?;
                self.store = undo.store;
                self.access = undo.access;
                Ok(ResultSet::Rollback)
            },
            Statement::Grant(grant) => {
                if let Some(table) = &grant.on {
                    self.store.assert_read_table(table)?;
                }
                self.access.grant(&grant.grantee)?;
                Ok(ResultSet::Grant { grantee: grant.grantee })
            },
            Statement::Revoke(revoke) => {
                warn!("REVOKE leaves built-in role permissions unchanged");
                Ok(ResultSet::Revoke { grantee: revoke.grantee })
            },
            statement => Plan::build(&statement, params, &self.store)?.execute(&mut self.store),
        }
    }

    fn log_query(&mut self, sql: &str, result: &ExecuteResult) {
        let capacity = self.config.query_log_capacity;
        if capacity == 0 {
            return;
        }
        while self.query_log.len() >= capacity {
            self.query_log.pop_front();
        }
        self.query_log.push_back(QueryRecord {
            sql: sql.to_string(),
            statement_type: result.statement_type,
            success: result.success,
            error: result.error.clone(),
            changes: result.changes,
            rows: result.row_count,
            execution_time: result.execution_time,
            timestamp: Utc::now(),
        });
    }

    /// Executed statements, oldest first.
    pub fn query_log(&self) -> impl Iterator<Item = &QueryRecord> {
        self.query_log.iter()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Rewrites a SELECT to bound its result size by the configured limit.
    pub fn optimize(&self, sql: &str) -> Result<String> {
        parser::optimize_with_limit(sql, self.config.select_limit)
    }

    /// Table names, in order.
    pub fn list_tables(&self) -> Vec<String> {
        self.store.table_names()
    }

    pub fn get_schema(&self, table: &str) -> Option<Table> {
        self.store.read_table(table).ok().flatten()
    }

    pub fn add_user(&mut self, username: &str, password: &str, role: &str) -> Result<()> {
        self.access.add_user(username, password, role)
    }

    pub fn remove_user(&mut self, username: &str) -> bool {
        self.access.remove_user(username)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<Identity> {
        self.access.authenticate(username, password)
    }

    pub fn users(&self) -> Vec<Identity> {
        self.access.users()
    }

    pub fn access(&self) -> &Access {
        &self.access
    }
}
