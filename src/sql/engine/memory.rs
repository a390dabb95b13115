use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_derive::{Deserialize, Serialize};

use super::Store;
use crate::error::{Error, Result};
use crate::sql::schema::{Catalog, Table, Tables};
use crate::sql::types::{Key, Row, Value};

/// A relation: a table schema, its rows and its id counter. Keeping the
/// three together means every relation always has exactly one schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub schema: Table,
    pub rows: Vec<Row>,
    pub next_id: i64,
    /// Row positions by value for each unique column, derived from the rows.
    #[serde(skip)]
    keys: Vec<(usize, HashMap<Key, BTreeSet<usize>>)>,
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.rows == other.rows && self.next_id == other.next_id
    }
}

impl Relation {
    fn new(schema: Table) -> Self {
        let mut relation = Self { schema, rows: vec![], next_id: 1, keys: vec![] };
        relation.reindex();
        relation
    }

    /// Advances the id counter past an explicitly stored id.
    fn observe(&mut self, row: &Row) {
        if let Some(column) = self.schema.auto_increment() {
            if let Some(Value::Integer(id)) = row.get(&column.name) {
                self.next_id = self.next_id.max(id.saturating_add(1));
            }
        }
    }

    /// Rebuilds the unique keys from scratch, after a schema change or a
    /// delete has shifted row positions.
    fn reindex(&mut self) {
        self.keys = self.schema.unique_columns().into_iter().map(|c| (c, HashMap::new())).collect();
        for position in 0..self.rows.len() {
            self.index(position);
        }
    }

    fn index(&mut self, position: usize) {
        let tuple = self.schema.tuple(&self.rows[position]);
        for (column, keys) in self.keys.iter_mut() {
            if let Some(key) = tuple[*column].key() {
                keys.entry(key).or_default().insert(position);
            }
        }
    }

    fn unindex(&mut self, position: usize) {
        let tuple = self.schema.tuple(&self.rows[position]);
        for (column, keys) in self.keys.iter_mut() {
            if let Some(key) = tuple[*column].key() {
                if let Some(positions) = keys.get_mut(&key) {
                    positions.remove(&position);
                    if positions.is_empty() {
                        keys.remove(&key);
                    }
                }
            }
        }
    }
}

/// An in-memory store of named relations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Memory {
    relations: BTreeMap<String, Relation>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a relation, or errors if it does not exist.
    pub fn relation(&self, table: &str) -> Result<&Relation> {
        self.relations.get(table).ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    fn relation_mut(&mut self, table: &str) -> Result<&mut Relation> {
        self.relations.get_mut(table).ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    /// Table names, in order.
    pub fn table_names(&self) -> Vec<String> {
        self.relations.keys().cloned().collect()
    }

    /// Checks that every relation's rows conform to its schema and rebuilds
    /// the unique keys, as after loading a snapshot.
    pub fn restore(&mut self) -> Result<()> {
        for (name, relation) in self.relations.iter_mut() {
            if *name != relation.schema.name {
                return Err(Error::Snapshot(format!(
                    "Relation {} holds the schema of table {}",
                    name, relation.schema.name
                )));
            }
            relation.schema.validate()?;
            for row in &relation.rows {
                if let Some(column) = row.columns().find(|c| relation.schema.get_column_index(c).is_err()) {
                    return Err(Error::Snapshot(format!("Row in {} has unknown column {}", name, column)));
                }
                relation
                    .schema
                    .validate_row(&relation.schema.tuple(row))
                    .map_err(|err| Error::Snapshot(format!("Row in {} is invalid: {}", name, err)))?;
            }
            relation.reindex();
            for (column, keys) in &relation.keys {
                if keys.values().any(|positions| positions.len() > 1) {
                    return Err(Error::Snapshot(format!(
                        "Rows in {} share a value in unique column {}",
                        name, relation.schema.columns[*column].name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Catalog for Memory {
    fn create_table(&mut self, table: Table) -> Result<()> {
        if self.relations.contains_key(&table.name) {
            return Err(Error::TableAlreadyExists(table.name));
        }
        self.relations.insert(table.name.clone(), Relation::new(table));
        Ok(())
    }

    fn delete_table(&mut self, table: &str) -> Result<()> {
        self.relations.remove(table).map(|_| ()).ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    fn read_table(&self, table: &str) -> Result<Option<Table>> {
        Ok(self.relations.get(table).map(|r| r.schema.clone()))
    }

    fn alter_table(&mut self, name: &str, table: Table) -> Result<()> {
        if table.name != name && self.relations.contains_key(&table.name) {
            return Err(Error::TableAlreadyExists(table.name));
        }
        let mut relation =
            self.relations.remove(name).ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        relation.schema = table;
        relation.reindex();
        self.relations.insert(relation.schema.name.clone(), relation);
        Ok(())
    }

    fn scan_tables(&self) -> Result<Tables> {
        Ok(Box::new(
            self.relations.values().map(|r| r.schema.clone()).collect::<Vec<_>>().into_iter(),
        ))
    }
}

impl Store for Memory {
    fn scan(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.relation(table)?.rows.clone())
    }

    fn count(&self, table: &str) -> Result<usize> {
        Ok(self.relation(table)?.rows.len())
    }

    fn lookup(&self, table: &str, column: usize, value: &Value) -> Result<Vec<usize>> {
        let relation = self.relation(table)?;
        let key = match value.key() {
            Some(key) => key,
            None => return Ok(vec![]),
        };
        match relation.keys.iter().find(|(c, _)| *c == column) {
            Some((_, keys)) => Ok(keys.get(&key).map(|p| p.iter().copied().collect()).unwrap_or_default()),
            None => Ok(relation
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| relation.schema.tuple(row).get(column).and_then(Value::key) == Some(key.clone()))
                .map(|(i, _)| i)
                .collect()),
        }
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<()> {
        let relation = self.relation_mut(table)?;
        relation.observe(&row);
        relation.rows.push(row);
        relation.index(relation.rows.len() - 1);
        Ok(())
    }

    fn update(&mut self, table: &str, position: usize, row: Row) -> Result<()> {
        let relation = self.relation_mut(table)?;
        if position >= relation.rows.len() {
            return Err(Error::Internal(format!("No row at {} in table {}", position, table)));
        }
        relation.observe(&row);
        relation.unindex(position);
        relation.rows[position] = row;
        relation.index(position);
        Ok(())
    }

    fn delete(&mut self, table: &str, positions: &[usize]) -> Result<usize> {
        let relation = self.relation_mut(table)?;
        let positions: HashSet<usize> = positions.iter().copied().collect();
        let before = relation.rows.len();
        let mut position = 0;
        relation.rows.retain(|_| {
            position += 1;
            !positions.contains(&(position - 1))
        });
        let removed = before - relation.rows.len();
        if removed > 0 {
            relation.reindex();
        }
        Ok(removed)
    }

    fn next_id(&self, table: &str) -> Result<i64> {
        Ok(self.relation(table)?.next_id)
    }
}
