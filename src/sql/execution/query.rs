use std::collections::HashSet;

use super::{query_rows, Executor, ResultSet};
use crate::error::Result;
use crate::sql::engine::Store;
use crate::sql::parser::ast::Direction;
use crate::sql::types::{Operand, Predicate};

/// A filter executor
pub struct Filter<S: Store> {
    source: Box<dyn Executor<S>>,
    predicate: Predicate,
}

impl<S: Store> Filter<S> {
    pub fn new(source: Box<dyn Executor<S>>, predicate: Predicate) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl<S: Store> Executor<S> for Filter<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let (columns, mut rows) = query_rows(self.source.execute(store)?)?;
        rows.retain(|row| self.predicate.test(row));
        Ok(ResultSet::Query { columns, rows })
    }
}

/// A projection executor
pub struct Projection<S: Store> {
    source: Box<dyn Executor<S>>,
    expressions: Vec<(Operand, String)>,
}

impl<S: Store> Projection<S> {
    pub fn new(source: Box<dyn Executor<S>>, expressions: Vec<(Operand, String)>) -> Box<Self> {
        Box::new(Self { source, expressions })
    }
}

impl<S: Store> Executor<S> for Projection<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let (_, rows) = query_rows(self.source.execute(store)?)?;
        let rows = rows
            .iter()
            .map(|row| self.expressions.iter().map(|(e, _)| e.evaluate(row).clone()).collect())
            .collect();
        let columns = self.expressions.into_iter().map(|(_, label)| label).collect();
        Ok(ResultSet::Query { columns, rows })
    }
}

/// An ORDER BY executor. The sort is stable, and each key's direction
/// applies to that key's comparison only, so ties keep their input order.
pub struct Order<S: Store> {
    source: Box<dyn Executor<S>>,
    orders: Vec<(usize, Direction)>,
}

impl<S: Store> Order<S> {
    pub fn new(source: Box<dyn Executor<S>>, orders: Vec<(usize, Direction)>) -> Box<Self> {
        Box::new(Self { source, orders })
    }
}

impl<S: Store> Executor<S> for Order<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let (columns, mut rows) = query_rows(self.source.execute(store)?)?;
        rows.sort_by(|a, b| {
            for (index, direction) in &self.orders {
                let ordering = a[*index].sort_cmp(&b[*index]);
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(ResultSet::Query { columns, rows })
    }
}

/// A DISTINCT executor, keeping the first occurrence of each row
pub struct Distinct<S: Store> {
    source: Box<dyn Executor<S>>,
}

impl<S: Store> Distinct<S> {
    pub fn new(source: Box<dyn Executor<S>>) -> Box<Self> {
        Box::new(Self { source })
    }
}

impl<S: Store> Executor<S> for Distinct<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let (columns, mut rows) = query_rows(self.source.execute(store)?)?;
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.clone()));
        Ok(ResultSet::Query { columns, rows })
    }
}

/// An OFFSET executor
pub struct Offset<S: Store> {
    source: Box<dyn Executor<S>>,
    offset: u64,
}

impl<S: Store> Offset<S> {
    pub fn new(source: Box<dyn Executor<S>>, offset: u64) -> Box<Self> {
        Box::new(Self { source, offset })
    }
}

impl<S: Store> Executor<S> for Offset<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let (columns, rows) = query_rows(self.source.execute(store)?)?;
        let rows = rows.into_iter().skip(usize::try_from(self.offset).unwrap_or(usize::MAX)).collect();
        Ok(ResultSet::Query { columns, rows })
    }
}

/// A LIMIT executor
pub struct Limit<S: Store> {
    source: Box<dyn Executor<S>>,
    limit: u64,
}

impl<S: Store> Limit<S> {
    pub fn new(source: Box<dyn Executor<S>>, limit: u64) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl<S: Store> Executor<S> for Limit<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let (columns, mut rows) = query_rows(self.source.execute(store)?)?;
        rows.truncate(usize::try_from(self.limit).unwrap_or(usize::MAX));
        Ok(ResultSet::Query { columns, rows })
    }
}
