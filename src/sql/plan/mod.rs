mod planner;

pub use planner::Planner;

use super::engine::Store;
use super::execution::{Executor, ResultSet};
use super::parser::ast::{Conflict, Direction, JoinKind};
use super::schema::{Catalog, Column, Index, Table};
use super::types::{Aggregate, Operand, Predicate, Value};
use crate::error::Result;

/// A plan node
#[derive(Debug)]
pub enum Node {
    CreateTable {
        schema: Table,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    CreateIndex {
        table: String,
        index: Index,
        if_not_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
    AlterTable {
        table: String,
        alteration: Alteration,
    },

    Insert {
        table: String,
        /// Target columns, or None for schema order.
        columns: Option<Vec<String>>,
        source: Box<Node>,
        conflict: Conflict,
    },
    Update {
        table: String,
        filter: Option<Predicate>,
        /// Column positions and their new values, over the table's columns.
        set: Vec<(usize, Operand)>,
        conflict: Conflict,
    },
    Delete {
        table: String,
        filter: Option<Predicate>,
    },

    /// A single empty row, the source of a SELECT without FROM.
    Nothing,
    Values {
        rows: Vec<Vec<Value>>,
    },
    Scan {
        table: String,
        alias: Option<String>,
    },
    Filter {
        source: Box<Node>,
        predicate: Predicate,
    },
    NestedLoopJoin {
        left: Box<Node>,
        right: Box<Node>,
        predicate: Option<Predicate>,
        kind: JoinKind,
    },
    Aggregation {
        source: Box<Node>,
        group_by: Vec<Operand>,
        aggregates: Vec<(Aggregate, Operand)>,
    },
    Projection {
        source: Box<Node>,
        expressions: Vec<(Operand, String)>,
    },
    Order {
        source: Box<Node>,
        orders: Vec<(usize, Direction)>,
    },
    Distinct {
        source: Box<Node>,
    },
    Offset {
        source: Box<Node>,
        offset: u64,
    },
    Limit {
        source: Box<Node>,
        limit: u64,
    },
}

/// ALTER TABLE changes
#[derive(Debug)]
pub enum Alteration {
    AddColumn(Column),
    RenameTable(String),
    RenameColumn { from: String, to: String },
}

/// A query plan
#[derive(Debug)]
pub struct Plan {
    pub node: Node,
}

impl Plan {
    /// Builds a plan for a statement, binding its parameters.
    pub fn build<C: Catalog>(
        statement: &super::parser::ast::Statement,
        params: &[Value],
        catalog: &C,
    ) -> Result<Self> {
        Planner::new(catalog, params).build(statement)
    }

    /// Executes the plan against a store, consuming it.
    pub fn execute<S: Store + 'static>(self, store: &mut S) -> Result<ResultSet> {
        <dyn Executor<S>>::build(self.node).execute(store)
    }
}
