//! The SQL engine provides fundamental CRUD storage operations over named
//! relations.
mod memory;

pub use memory::{Memory, Relation};

use super::schema::Catalog;
use super::types::{Row, Value};
use crate::error::Result;

/// A relational store. Rows are addressed by their position within a
/// relation, which is their insertion order.
pub trait Store: Catalog {
    /// Returns a snapshot copy of a relation's rows, in insertion order.
    fn scan(&self, table: &str) -> Result<Vec<Row>>;
    /// Returns the number of rows in a relation.
    fn count(&self, table: &str) -> Result<usize>;
    /// Returns the positions of rows whose value in a column equals the
    /// given value, as unique constraints compare them. NULL matches nothing.
    fn lookup(&self, table: &str, column: usize, value: &Value) -> Result<Vec<usize>>;
    /// Appends a row to a relation.
    fn insert(&mut self, table: &str, row: Row) -> Result<()>;
    /// Replaces the row at a position.
    fn update(&mut self, table: &str, position: usize, row: Row) -> Result<()>;
    /// Removes the rows at the given positions, returning how many were removed.
    fn delete(&mut self, table: &str, positions: &[usize]) -> Result<usize>;
    /// Returns the id the table's counter will issue next. Counters never
    /// move backwards, so ids are not reused after deletes.
    fn next_id(&self, table: &str) -> Result<i64>;
}
