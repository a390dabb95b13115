use std::collections::HashSet;

use log::info;

use super::{Executor, ResultSet};
use crate::error::{Error, Result};
use crate::sql::engine::Store;
use crate::sql::plan::Alteration;
use crate::sql::schema::{Index, Table};
use crate::sql::types::{Key, Value};

/// A CREATE TABLE executor
pub struct CreateTable {
    table: Table,
    if_not_exists: bool,
}

impl CreateTable {
    pub fn new(table: Table, if_not_exists: bool) -> Box<Self> {
        Box::new(Self { table, if_not_exists })
    }
}

impl<S: Store> Executor<S> for CreateTable {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let name = self.table.name.clone();
        if self.if_not_exists && store.read_table(&name)?.is_some() {
            return Ok(ResultSet::CreateTable { name, created: false });
        }
        store.create_table(self.table)?;
        info!("Created table {}", name);
        Ok(ResultSet::CreateTable { name, created: true })
    }
}

/// A DROP TABLE executor
pub struct DropTable {
    table: String,
    if_exists: bool,
}

impl DropTable {
    pub fn new(table: String, if_exists: bool) -> Box<Self> {
        Box::new(Self { table, if_exists })
    }
}

impl<S: Store> Executor<S> for DropTable {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        if self.if_exists && store.read_table(&self.table)?.is_none() {
            return Ok(ResultSet::DropTable { name: self.table, existed: false });
        }
        store.delete_table(&self.table)?;
        info!("Dropped table {}", self.table);
        Ok(ResultSet::DropTable { name: self.table, existed: true })
    }
}

/// A CREATE INDEX executor. A unique index requires the indexed columns
/// of existing rows to be unique.
pub struct CreateIndex {
    table: String,
    index: Index,
    if_not_exists: bool,
}

impl CreateIndex {
    pub fn new(table: String, index: Index, if_not_exists: bool) -> Box<Self> {
        Box::new(Self { table, index, if_not_exists })
    }
}

impl<S: Store> Executor<S> for CreateIndex {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let name = self.index.name.clone();
        if store.find_index(&name)?.is_some() {
            return match self.if_not_exists {
                true => Ok(ResultSet::CreateIndex { name, created: false }),
                false => Err(Error::IndexAlreadyExists(name)),
            };
        }
        let mut table = store.assert_read_table(&self.table)?;
        let columns =
            self.index.columns.iter().map(|c| table.get_column_index(c)).collect::<Result<Vec<_>>>()?;

        if self.index.unique {
            let mut seen = HashSet::new();
            for row in store.scan(&table.name)? {
                let tuple = table.tuple(&row);
                // Rows with a NULL in any indexed column never clash.
                let key: Option<Vec<Key>> = columns.iter().map(|i| tuple[*i].key()).collect();
                if !key.map_or(true, |key| seen.insert(key)) {
                    return Err(Error::Constraint(format!(
                        "UNIQUE constraint failed: {}.{}",
                        table.name,
                        self.index.columns.join(", ")
                    )));
                }
            }
        }

        table.indexes.push(self.index);
        store.alter_table(&self.table, table)?;
        info!("Created index {} on table {}", name, self.table);
        Ok(ResultSet::CreateIndex { name, created: true })
    }
}

/// A DROP INDEX executor
pub struct DropIndex {
    name: String,
    if_exists: bool,
}

impl DropIndex {
    pub fn new(name: String, if_exists: bool) -> Box<Self> {
        Box::new(Self { name, if_exists })
    }
}

impl<S: Store> Executor<S> for DropIndex {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        match store.find_index(&self.name)? {
            Some(mut table) => {
                table.indexes.retain(|i| i.name != self.name);
                let owner = table.name.clone();
                store.alter_table(&owner, table)?;
                Ok(ResultSet::DropIndex { name: self.name, existed: true })
            },
            None if self.if_exists => Ok(ResultSet::DropIndex { name: self.name, existed: false }),
            None => Err(Error::IndexNotFound(self.name)),
        }
    }
}

/// An ALTER TABLE executor
pub struct AlterTable {
    table: String,
    alteration: Alteration,
}

impl AlterTable {
    pub fn new(table: String, alteration: Alteration) -> Box<Self> {
        Box::new(Self { table, alteration })
    }
}

impl<S: Store> Executor<S> for AlterTable {
    fn execute(self: Box<Self>, store: &mut S) -> Result<ResultSet> {
        let Self { table: name, alteration } = *self;
        let mut table = store.assert_read_table(&name)?;
        match alteration {
            Alteration::AddColumn(column) => {
                if table.get_column_index(&column.name).is_ok() {
                    return Err(Error::Validation(format!(
                        "Duplicate column {} in table {}",
                        column.name, table.name
                    )));
                }
                if column.is_primary_key || column.is_unique {
                    return Err(Error::Unsupported(format!(
                        "Cannot add a PRIMARY KEY or UNIQUE column {}",
                        column.name
                    )));
                }
                let rows = store.scan(&table.name)?;
                let value = column.default.clone().unwrap_or(Value::Null);
                if !rows.is_empty() {
                    column.validate_value(&table.name, &value)?;
                }
                table.columns.push(column.clone());
                table.validate()?;
                store.alter_table(&name, table)?;
                for (position, mut row) in rows.into_iter().enumerate() {
                    row.set(&column.name, value.clone());
                    store.update(&name, position, row)?;
                }
            },
            Alteration::RenameTable(rename) => {
                if store.read_table(&rename)?.is_some() {
                    return Err(Error::TableAlreadyExists(rename));
                }
                table.name = rename;
                store.alter_table(&name, table)?;
            },
            Alteration::RenameColumn { from, to } => {
                let index = table.get_column_index(&from)?;
                if table.get_column_index(&to).is_ok() {
                    return Err(Error::Validation(format!("Duplicate column {} in table {}", to, table.name)));
                }
                table.columns[index].name = to.clone();
                for idx in table.indexes.iter_mut() {
                    for column in idx.columns.iter_mut().filter(|c| **c == from) {
                        *column = to.clone();
                    }
                }
                let rows = store.scan(&table.name)?;
                store.alter_table(&name, table)?;
                for (position, mut row) in rows.into_iter().enumerate() {
                    row.rename(&from, &to);
                    store.update(&name, position, row)?;
                }
            },
        }
        info!("Altered table {}", name);
        Ok(ResultSet::AlterTable { name })
    }
}
