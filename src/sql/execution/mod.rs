mod aggregate;
mod join;
mod mutation;
mod query;
mod schema;
mod source;

use serde_derive::{Deserialize, Serialize};

use self::aggregate::Aggregation;
use self::join::NestedLoopJoin;
use self::mutation::{Delete, Insert, Update};
use self::query::{Distinct, Filter, Limit, Offset, Order, Projection};
use self::schema::{AlterTable, CreateIndex, CreateTable, DropIndex, DropTable};
use self::source::{Nothing, Scan, Values};

use super::engine::Store;
use super::plan::Node;
use super::types::{Row, Tuple, Value};
use crate::error::{Error, Result};

/// A plan executor.
pub trait Executor<S: Store> {
    /// Executes the executor, consuming it and returning a result set.
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet>;
}

impl<S: Store + 'static> dyn Executor<S> {
    /// Builds an executor for a plan node, consuming it.
    pub fn build(node: Node) -> Box<dyn Executor<S>> {
        match node {
            Node::CreateTable { schema, if_not_exists } => CreateTable::new(schema, if_not_exists),
            Node::DropTable { table, if_exists } => DropTable::new(table, if_exists),
            Node::CreateIndex { table, index, if_not_exists } => CreateIndex::new(table, index, if_not_exists),
            Node::DropIndex { name, if_exists } => DropIndex::new(name, if_exists),
            Node::AlterTable { table, alteration } => AlterTable::new(table, alteration),

            Node::Insert { table, columns, source, conflict } => {
                Insert::new(table, columns, Self::build(*source), conflict)
            },
            Node::Update { table, filter, set, conflict } => Update::new(table, filter, set, conflict),
            Node::Delete { table, filter } => Delete::new(table, filter),

            Node::Nothing => Nothing::new(),
            Node::Values { rows } => Values::new(rows),
            Node::Scan { table, alias: _ } => Scan::new(table),
            Node::Filter { source, predicate } => Filter::new(Self::build(*source), predicate),
            Node::NestedLoopJoin { left, right, predicate, kind } => {
                NestedLoopJoin::new(Self::build(*left), Self::build(*right), predicate, kind)
            },
            Node::Aggregation { source, group_by, aggregates } => {
                Aggregation::new(Self::build(*source), group_by, aggregates)
            },
            Node::Projection { source, expressions } => Projection::new(Self::build(*source), expressions),
            Node::Order { source, orders } => Order::new(Self::build(*source), orders),
            Node::Distinct { source } => Distinct::new(Self::build(*source)),
            Node::Offset { source, offset } => Offset::new(Self::build(*source), offset),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
        }
    }
}

/// An executor result set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResultSet {
    /// Transaction started
    Begin,
    /// Transaction committed
    Commit,
    /// Transaction rolled back
    Rollback,

    /// Rows created
    Create { count: u64, last_insert_id: Option<i64> },
    /// Rows updated
    Update { count: u64 },
    /// Rows deleted
    Delete { count: u64 },
    /// Query results
    Query { columns: Vec<String>, rows: Vec<Tuple> },

    /// Table created, or already present with IF NOT EXISTS
    CreateTable { name: String, created: bool },
    /// Table dropped, or already absent with IF EXISTS
    DropTable { name: String, existed: bool },
    CreateIndex { name: String, created: bool },
    DropIndex { name: String, existed: bool },
    AlterTable { name: String },

    /// Privileges granted to a user
    Grant { grantee: String },
    /// Privileges revoked from a user
    Revoke { grantee: String },
}

impl ResultSet {
    /// Converts a query result into rows of column name to value.
    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self {
            ResultSet::Query { columns, rows } => Ok(rows
                .into_iter()
                .map(|tuple| columns.iter().cloned().zip(tuple).collect())
                .collect()),
            result => Err(Error::Value(format!("Not a query result: {:?}", result))),
        }
    }

    /// Converts the result into its first value, if a query returned one.
    pub fn into_value(self) -> Result<Value> {
        match self {
            ResultSet::Query { rows, .. } => rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .ok_or_else(|| Error::Value("No value returned".into())),
            result => Err(Error::Value(format!("Not a query result: {:?}", result))),
        }
    }

    /// The number of rows changed by a mutation, if any.
    pub fn changes(&self) -> Option<u64> {
        match self {
            ResultSet::Create { count, .. } | ResultSet::Update { count } | ResultSet::Delete { count } => {
                Some(*count)
            },
            _ => None,
        }
    }
}

/// Takes the rows of a query result from a source executor.
fn query_rows(result: ResultSet) -> Result<(Vec<String>, Vec<Tuple>)> {
    match result {
        ResultSet::Query { columns, rows } => Ok((columns, rows)),
        result => Err(Error::Internal(format!("Unexpected result {:?}", result))),
    }
}
