use std::cmp::Ordering;
use std::collections::HashMap;

use super::{query_rows, Executor, ResultSet};
use crate::error::Result;
use crate::sql::engine::Store;
use crate::sql::types::{Aggregate, Operand, Tuple, Value};

/// An aggregation executor. Groups source rows by the GROUP BY operands,
/// in order of first appearance, and emits one row per group holding the
/// group values followed by the aggregate results.
pub struct Aggregation<S: Store> {
    source: Box<dyn Executor<S>>,
    group_by: Vec<Operand>,
    aggregates: Vec<(Aggregate, Operand)>,
}

impl<S: Store> Aggregation<S> {
    pub fn new(
        source: Box<dyn Executor<S>>,
        group_by: Vec<Operand>,
        aggregates: Vec<(Aggregate, Operand)>,
    ) -> Box<Self> {
        Box::new(Self { source, group_by, aggregates })
    }
}

impl<S: Store> Executor<S> for Aggregation<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let Self { source, group_by, aggregates } = *self;
        let (_, rows) = query_rows(source.execute(store)?)?;
        let accumulators = || -> Vec<Accumulator> { aggregates.iter().map(|(a, _)| Accumulator::new(*a)).collect() };

        let mut groups: Vec<(Tuple, Vec<Accumulator>)> = vec![];
        let mut positions: HashMap<Tuple, usize> = HashMap::new();
        // An ungrouped aggregate over no rows still yields a single row.
        if group_by.is_empty() {
            groups.push((vec![], accumulators()));
            positions.insert(vec![], 0);
        }

        for row in &rows {
            let key: Tuple = group_by.iter().map(|g| g.evaluate(row).clone()).collect();
            let position = match positions.get(&key) {
                Some(position) => *position,
                None => {
                    groups.push((key.clone(), accumulators()));
                    positions.insert(key, groups.len() - 1);
                    groups.len() - 1
                },
            };
            for (accumulator, (_, operand)) in groups[position].1.iter_mut().zip(&aggregates) {
                accumulator.accumulate(operand.evaluate(row));
            }
        }

        let columns = group_by
            .iter()
            .enumerate()
            .map(|(i, _)| format!("#{}", i))
            .chain(aggregates.iter().map(|(a, _)| a.to_string()))
            .collect();
        let rows = groups
            .into_iter()
            .map(|(mut key, accumulators)| {
                key.extend(accumulators.into_iter().map(Accumulator::finish));
                key
            })
            .collect();
        Ok(ResultSet::Query { columns, rows })
    }
}

/// Running state of one aggregate function within a group
#[derive(Debug)]
enum Accumulator {
    Count { all: bool, count: i64 },
    Sum { integer: Option<i64>, real: f64, all_integer: bool, seen: bool },
    Avg { sum: f64, count: u64 },
    Extreme { value: Value, keep: Ordering },
}

impl Accumulator {
    fn new(aggregate: Aggregate) -> Self {
        match aggregate {
            Aggregate::CountAll => Self::Count { all: true, count: 0 },
            Aggregate::Count => Self::Count { all: false, count: 0 },
            Aggregate::Sum => Self::Sum { integer: Some(0), real: 0.0, all_integer: true, seen: false },
            Aggregate::Avg => Self::Avg { sum: 0.0, count: 0 },
            Aggregate::Min => Self::Extreme { value: Value::Null, keep: Ordering::Less },
            Aggregate::Max => Self::Extreme { value: Value::Null, keep: Ordering::Greater },
        }
    }

    fn accumulate(&mut self, value: &Value) {
        match self {
            Self::Count { all, count } => {
                if *all || !value.is_null() {
                    *count += 1
                }
            },
            _ if value.is_null() => {},
            Self::Sum { integer, real, all_integer, seen } => {
                *seen = true;
                match value {
                    Value::Integer(i) => *integer = integer.and_then(|sum| sum.checked_add(*i)),
                    _ => *all_integer = false,
                }
                *real += value.as_number().unwrap_or(0.0);
            },
            Self::Avg { sum, count } => {
                *sum += value.as_number().unwrap_or(0.0);
                *count += 1;
            },
            Self::Extreme { value: current, keep } => {
                if current.is_null() || value.compare(current) == Some(*keep) {
                    *current = value.clone();
                }
            },
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Count { count, .. } => Value::Integer(count),
            Self::Sum { seen: false, .. } => Value::Null,
            Self::Sum { integer: Some(sum), all_integer: true, .. } => Value::Integer(sum),
            Self::Sum { real, .. } => Value::Real(real),
            Self::Avg { count: 0, .. } => Value::Null,
            Self::Avg { sum, count } => Value::Real(sum / count as f64),
            Self::Extreme { value, .. } => value,
        }
    }
}
