use super::{Executor, ResultSet};
use crate::error::Result;
use crate::sql::engine::Store;
use crate::sql::types::Value;

/// A table scan executor. Produces a snapshot of the table's rows in
/// insertion order, laid out in schema order.
pub struct Scan {
    table: String,
}

impl Scan {
    pub fn new(table: String) -> Box<Self> {
        Box::new(Self { table })
    }
}

impl<S: Store> Executor<S> for Scan {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let table = store.assert_read_table(&self.table)?;
        let rows = store.scan(&table.name)?.iter().map(|row| table.tuple(row)).collect();
        Ok(ResultSet::Query { columns: table.column_names(), rows })
    }
}

/// An executor that produces a single empty row
pub struct Nothing;

impl Nothing {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl<S: Store> Executor<S> for Nothing {
    fn execute(self: Box<Self>, _: &mut S) -> Result<ResultSet> {
        Ok(ResultSet::Query { columns: vec![], rows: vec![vec![]] })
    }
}

/// An executor for constant rows, as given by INSERT ... VALUES
pub struct Values {
    rows: Vec<Vec<Value>>,
}

impl Values {
    pub fn new(rows: Vec<Vec<Value>>) -> Box<Self> {
        Box::new(Self { rows })
    }
}

impl<S: Store> Executor<S> for Values {
    fn execute(self: Box<Self>, _: &mut S) -> Result<ResultSet> {
        Ok(ResultSet::Query { columns: vec![], rows: self.rows })
    }
}
