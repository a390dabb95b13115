use super::{query_rows, Executor, ResultSet};
use crate::error::Result;
use crate::sql::engine::Store;
use crate::sql::parser::ast::JoinKind;
use crate::sql::types::{Predicate, Tuple, Value};

/// A nested loop join executor, which checks each row in the left source
/// against every row in the right source using the given predicate. Outer
/// joins pad unmatched rows with NULLs.
pub struct NestedLoopJoin<S: Store> {
    left: Box<dyn Executor<S>>,
    right: Box<dyn Executor<S>>,
    predicate: Option<Predicate>,
    kind: JoinKind,
}

impl<S: Store> NestedLoopJoin<S> {
    pub fn new(
        left: Box<dyn Executor<S>>,
        right: Box<dyn Executor<S>>,
        predicate: Option<Predicate>,
        kind: JoinKind,
    ) -> Box<Self> {
        Box::new(Self { left, right, predicate, kind })
    }
}

fn matches(predicate: &Option<Predicate>, row: &[Value]) -> bool {
    predicate.as_ref().map_or(true, |p| p.test(row))
}

impl<S: Store> Executor<S> for NestedLoopJoin<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let Self { left, right, predicate, kind } = *self;
        let (mut columns, left) = query_rows(left.execute(store)?)?;
        let (right_columns, right) = query_rows(right.execute(store)?)?;
        let (left_width, right_width) = (columns.len(), right_columns.len());
        columns.extend(right_columns);

        let join = |l: &Tuple, r: &Tuple| -> Tuple { l.iter().chain(r.iter()).cloned().collect() };
        let mut rows = vec![];
        match kind {
            JoinKind::Inner | JoinKind::Cross | JoinKind::Left => {
                let nulls = vec![Value::Null; right_width];
                for l in &left {
                    let mut hit = false;
                    for r in &right {
                        let row = join(l, r);
                        if matches(&predicate, &row) {
                            hit = true;
                            rows.push(row);
                        }
                    }
                    if !hit && kind == JoinKind::Left {
                        rows.push(join(l, &nulls));
                    }
                }
            },
            JoinKind::Right => {
                let nulls = vec![Value::Null; left_width];
                for r in &right {
                    let mut hit = false;
                    for l in &left {
                        let row = join(l, r);
                        if matches(&predicate, &row) {
                            hit = true;
                            rows.push(row);
                        }
                    }
                    if !hit {
                        rows.push(join(&nulls, r));
                    }
                }
            },
        }
        Ok(ResultSet::Query { columns, rows })
    }
}
