use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use super::{query_rows, Executor, ResultSet};
use crate::error::{Error, Result};
use crate::sql::engine::Store;
use crate::sql::parser::ast::Conflict;
use crate::sql::schema::Table;
use crate::sql::types::{Key, Operand, Predicate, Tuple, Value};

/// Changes of a mutation in preparation. Changes are staged here and only
/// written to the store once every row of the statement has passed its
/// constraints. Stored rows are reached through the store's unique keys,
/// so only the changed rows are held.
struct Staged<'a, S: Store> {
    store: &'a S,
    table: &'a Table,
    unique: Vec<usize>,
    /// Number of stored rows. New rows take positions from here on.
    existing: usize,
    /// Staged tuples by position, replacing stored rows or appending new ones.
    tuples: BTreeMap<usize, Tuple>,
    /// Stored rows that will be removed.
    removed: BTreeSet<usize>,
    /// Positions of staged tuples by unique column and key.
    keys: HashMap<(usize, Key), BTreeSet<usize>>,
}

impl<'a, S: Store> Staged<'a, S> {
    fn new(store: &'a S, table: &'a Table, existing: usize) -> Self {
        Self {
            store,
            table,
            unique: table.unique_columns(),
            existing,
            tuples: BTreeMap::new(),
            removed: BTreeSet::new(),
            keys: HashMap::new(),
        }
    }

    /// Finds live rows other than `skip` that clash with a tuple on a unique
    /// column. NULLs never clash.
    fn conflicts(&self, tuple: &[Value], skip: Option<usize>) -> Result<Option<(usize, Vec<usize>)>> {
        for &column in &self.unique {
            let key = match tuple[column].key() {
                Some(key) => key,
                None => continue,
            };
            let mut clashes: Vec<usize> = self
                .store
                .lookup(&self.table.name, column, &tuple[column])?
                .into_iter()
                .filter(|p| Some(*p) != skip && !self.removed.contains(p) && !self.tuples.contains_key(p))
                .collect();
            if let Some(staged) = self.keys.get(&(column, key)) {
                clashes.extend(staged.iter().copied().filter(|p| Some(*p) != skip));
            }
            if !clashes.is_empty() {
                return Ok(Some((column, clashes)));
            }
        }
        Ok(None)
    }

    /// Resolves unique clashes for a tuple. Returns false if the tuple
    /// should be skipped.
    fn resolve(&mut self, tuple: &[Value], skip: Option<usize>, conflict: Conflict) -> Result<bool> {
        while let Some((column, clashes)) = self.conflicts(tuple, skip)? {
            match conflict {
                Conflict::Abort | Conflict::Fail | Conflict::Rollback => {
                    return Err(Error::Constraint(format!(
                        "UNIQUE constraint failed: {}.{}",
                        self.table.name, self.table.columns[column].name
                    )))
                },
                Conflict::Ignore => return Ok(false),
                Conflict::Replace => {
                    for position in clashes {
                        debug!("Replacing row {} of table {}", position, self.table.name);
                        self.remove(position);
                    }
                },
            }
        }
        Ok(true)
    }

    /// Stages a tuple at a position, replacing any tuple staged there.
    fn stage(&mut self, position: usize, tuple: Tuple) {
        self.unstage(position);
        for &column in &self.unique {
            if let Some(key) = tuple[column].key() {
                self.keys.entry((column, key)).or_default().insert(position);
            }
        }
        self.tuples.insert(position, tuple);
    }

    /// Stages a new row after the stored and previously staged ones.
    fn append(&mut self, tuple: Tuple) {
        let position = self.tuples.keys().next_back().map_or(self.existing, |p| (p + 1).max(self.existing));
        self.stage(position, tuple);
    }

    /// Removes the row at a position, whether stored or staged.
    fn remove(&mut self, position: usize) {
        self.unstage(position);
        if position < self.existing {
            self.removed.insert(position);
        }
    }

    fn unstage(&mut self, position: usize) {
        if let Some(tuple) = self.tuples.remove(&position) {
            for &column in &self.unique {
                if let Some(key) = tuple[column].key() {
                    if let Some(positions) = self.keys.get_mut(&(column, key.clone())) {
                        positions.remove(&position);
                        if positions.is_empty() {
                            self.keys.remove(&(column, key));
                        }
                    }
                }
            }
        }
    }

    /// Returns the staged tuples by position and the removed positions.
    fn finish(self) -> (BTreeMap<usize, Tuple>, Vec<usize>) {
        (self.tuples, self.removed.into_iter().collect())
    }
}

/// An INSERT executor
pub struct Insert<S: Store> {
    table: String,
    columns: Option<Vec<String>>,
    source: Box<dyn Executor<S>>,
    conflict: Conflict,
}

impl<S: Store> Insert<S> {
    pub fn new(
        table: String,
        columns: Option<Vec<String>>,
        source: Box<dyn Executor<S>>,
        conflict: Conflict,
    ) -> Box<Self> {
        Box::new(Self { table, columns, source, conflict })
    }
}

/// Maps the positions of a source tuple onto table column indexes.
/// Without an explicit column list, a tuple one short of the table width
/// skips the auto-incrementing column.
fn targets(table: &Table, columns: &Option<Vec<String>>, width: usize) -> Result<Vec<usize>> {
    match columns {
        Some(columns) if columns.len() != width => {
            Err(Error::ColumnCountMismatch { columns: columns.len(), values: width })
        },
        Some(columns) => columns.iter().map(|c| table.get_column_index(c)).collect(),
        None if width == table.columns.len() => Ok((0..width).collect()),
        None => match table.auto_increment().map(|c| table.get_column_index(&c.name)).transpose()? {
            Some(skip) if width + 1 == table.columns.len() => {
                Ok((0..table.columns.len()).filter(|i| *i != skip).collect())
            },
            _ => Err(Error::ColumnCountMismatch { columns: table.columns.len(), values: width }),
        },
    }
}

/// Builds a full tuple in schema order, filling omitted columns with their
/// defaults and applying column affinity.
fn build_tuple(table: &Table, targets: &[usize], values: Tuple) -> Tuple {
    let mut tuple: Tuple = table.columns.iter().map(|c| c.default.clone().unwrap_or(Value::Null)).collect();
    for (target, value) in targets.iter().zip(values) {
        tuple[*target] = value;
    }
    tuple.into_iter().zip(&table.columns).map(|(v, c)| v.coerce(c.datatype)).collect()
}

impl<S: Store> Executor<S> for Insert<S> {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let Self { table, columns, source, conflict } = *self;
        let table = store.assert_read_table(&table)?;
        let (_, values) = query_rows(source.execute(store)?)?;
        let serial = table.auto_increment().map(|c| table.get_column_index(&c.name)).transpose()?;
        let mut next_id = store.next_id(&table.name)?;
        let existing = store.count(&table.name)?;

        let mut staged = Staged::new(&*store, &table, existing);
        for values in values {
            let positions = targets(&table, &columns, values.len())?;
            let mut tuple = build_tuple(&table, &positions, values);
            if let Some(serial) = serial {
                match tuple[serial] {
                    Value::Null => {
                        tuple[serial] = Value::Integer(next_id);
                        next_id += 1;
                    },
                    Value::Integer(id) => next_id = next_id.max(id.saturating_add(1)),
                    _ => {},
                }
            }
            table.validate_row(&tuple)?;
            if staged.resolve(&tuple, None, conflict)? {
                staged.append(tuple);
            }
        }
        let (tuples, removed) = staged.finish();

        store.delete(&table.name, &removed)?;
        let inserted: Vec<Tuple> = tuples.into_values().collect();
        let key = table.get_column_index(&table.primary_key()?.name)?;
        let last_insert_id = match inserted.last().map(|t| &t[key]) {
            Some(Value::Integer(id)) => Some(*id),
            _ => None,
        };
        let count = inserted.len() as u64;
        for tuple in inserted {
            store.insert(&table.name, table.row(tuple))?;
        }
        Ok(ResultSet::Create { count, last_insert_id })
    }
}

/// An UPDATE executor. New values are computed from each row's values
/// before the update.
pub struct Update {
    table: String,
    filter: Option<Predicate>,
    set: Vec<(usize, Operand)>,
    conflict: Conflict,
}

impl Update {
    pub fn new(
        table: String,
        filter: Option<Predicate>,
        set: Vec<(usize, Operand)>,
        conflict: Conflict,
    ) -> Box<Self> {
        Box::new(Self { table, filter, set, conflict })
    }
}

impl<S: Store> Executor<S> for Update {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let table = store.assert_read_table(&self.table)?;
        let rows = store.scan(&table.name)?;

        let mut staged = Staged::new(&*store, &table, rows.len());
        let mut updated = vec![];
        for (position, row) in rows.iter().enumerate() {
            if staged.removed.contains(&position) {
                continue;
            }
            let old = table.tuple(row);
            if !self.filter.as_ref().map_or(true, |f| f.test(&old)) {
                continue;
            }
            let mut new = old.clone();
            for (column, operand) in &self.set {
                new[*column] = operand.evaluate(&old).clone().coerce(table.columns[*column].datatype);
            }
            table.validate_row(&new)?;
            if !staged.resolve(&new, Some(position), self.conflict)? {
                continue;
            }
            staged.stage(position, new);
            updated.push(position);
        }
        let (mut tuples, removed) = staged.finish();

        // Positions shift on delete, so updates are written first.
        let mut count = 0;
        for position in updated {
            if let Some(tuple) = tuples.remove(&position) {
                store.update(&table.name, position, table.row(tuple))?;
                count += 1;
            }
        }
        store.delete(&table.name, &removed)?;
        Ok(ResultSet::Update { count })
    }
}

/// A DELETE executor
pub struct Delete {
    table: String,
    filter: Option<Predicate>,
}

impl Delete {
    pub fn new(table: String, filter: Option<Predicate>) -> Box<Self> {
        Box::new(Self { table, filter })
    }
}

impl<S: Store> Executor<S> for Delete {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let table = store.assert_read_table(&self.table)?;
        let positions: Vec<usize> = store
            .scan(&table.name)?
            .iter()
            .enumerate()
            .filter(|(_, row)| self.filter.as_ref().map_or(true, |f| f.test(&table.tuple(row))))
            .map(|(i, _)| i)
            .collect();
        let count = store.delete(&table.name, &positions)?;
        Ok(ResultSet::Delete { count: count as u64 })
    }
}
