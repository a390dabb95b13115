use std::collections::HashSet;

use log::warn;
use serde_derive::{Deserialize, Serialize};

use super::types::{DataType, Row, Value};
use crate::error::{Error, Result};

/// Name of the column added to tables declared without a primary key.
pub const IMPLICIT_ID: &str = "id";

/// The catalog stores schema information
pub trait Catalog {
    /// Creates a new table.
    fn create_table(&mut self, table: Table) -> Result<()>;
    /// Deletes an existing table, or errors if it does not exist.
    fn delete_table(&mut self, table: &str) -> Result<()>;
    /// Reads a table, or returns None if it does not exist.
    fn read_table(&self, table: &str) -> Result<Option<Table>>;
    /// Replaces the schema of an existing table, which may be renamed.
    fn alter_table(&mut self, name: &str, table: Table) -> Result<()>;
    /// Iterates over all tables, ordered by name.
    fn scan_tables(&self) -> Result<Tables>;

    /// Reads a table, and errors if it does not exist.
    fn assert_read_table(&self, table: &str) -> Result<Table> {
        self.read_table(table)?.ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    /// Finds the table owning an index.
    fn find_index(&self, index: &str) -> Result<Option<Table>> {
        Ok(self.scan_tables()?.find(|t| t.indexes.iter().any(|i| i.name == index)))
    }
}

/// A table scan iterator
pub type Tables = Box<dyn DoubleEndedIterator<Item = Table>>;

/// A table schema
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Table {
    /// Creates a new table schema. A table declared without a primary key
    /// gets a leading auto-incrementing `id` column.
    pub fn new(name: &str, mut columns: Vec<Column>) -> Result<Self> {
        if !columns.is_empty() && !columns.iter().any(|c| c.is_primary_key) {
            if columns.iter().any(|c| c.name == IMPLICIT_ID) {
                return Err(Error::Validation(format!(
                    "Table {} has an {} column but no primary key",
                    name, IMPLICIT_ID
                )));
            }
            warn!("Table {} has no primary key, adding column {}", name, IMPLICIT_ID);
            let mut id = Column::new(IMPLICIT_ID, DataType::Integer);
            id.is_primary_key = true;
            id.is_auto_increment = true;
            id.is_nullable = false;
            columns.insert(0, id);
        }
        let table = Self { name: name.to_string(), columns, indexes: vec![] };
        table.validate()?;
        Ok(table)
    }

    /// Validates a table schema.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Validation(format!("Table {} has no columns", self.name)));
        }
        match self.columns.iter().filter(|column| column.is_primary_key).count() {
            1 => {},
            0 => return Err(Error::Validation(format!("Table {} has no primary key", self.name))),
            _ => return Err(Error::Validation(format!("Table {} has multiple primary keys", self.name))),
        };
        let mut names = HashSet::new();
        for column in &self.columns {
            if !names.insert(&column.name) {
                return Err(Error::Validation(format!("Duplicate column {} in table {}", column.name, self.name)));
            }
            column.validate(self)?;
        }
        Ok(())
    }

    /// Fetches a column index by name.
    pub fn get_column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|column| column.name == name)
            .ok_or_else(|| Error::ColumnNotFound(format!("{}.{}", self.name, name)))
    }

    pub fn get_column(&self, name: &str) -> Result<&Column> {
        Ok(&self.columns[self.get_column_index(name)?])
    }

    /// Returns the primary key column.
    pub fn primary_key(&self) -> Result<&Column> {
        self.columns
            .iter()
            .find(|column| column.is_primary_key)
            .ok_or_else(|| Error::Internal(format!("Table {} has no primary key", self.name)))
    }

    /// Returns the auto-incrementing column, if any.
    pub fn auto_increment(&self) -> Option<&Column> {
        self.columns.iter().find(|column| column.is_auto_increment)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    /// Columns whose values must be unique across rows: the primary key,
    /// UNIQUE columns and single-column unique indexes.
    pub fn unique_columns(&self) -> Vec<usize> {
        let mut unique: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_primary_key || c.is_unique)
            .map(|(i, _)| i)
            .collect();
        for index in self.indexes.iter().filter(|i| i.unique && i.columns.len() == 1) {
            if let Ok(i) = self.get_column_index(&index.columns[0]) {
                if !unique.contains(&i) {
                    unique.push(i);
                }
            }
        }
        unique
    }

    /// Lays a row out in schema order. Missing columns are NULL.
    pub fn tuple(&self, row: &Row) -> Vec<Value> {
        self.columns.iter().map(|c| row.get(&c.name).cloned().unwrap_or(Value::Null)).collect()
    }

    /// Builds a row from values in schema order.
    pub fn row(&self, tuple: Vec<Value>) -> Row {
        self.columns.iter().map(|c| c.name.clone()).zip(tuple).collect()
    }

    /// Validates a row laid out in schema order.
    pub fn validate_row(&self, tuple: &[Value]) -> Result<()> {
        if tuple.len() != self.columns.len() {
            return Err(Error::ColumnCountMismatch { columns: self.columns.len(), values: tuple.len() });
        }
        for (column, value) in self.columns.iter().zip(tuple) {
            column.validate_value(&self.name, value)?;
        }
        Ok(())
    }
}

/// A table column schema
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column datatype
    #[serde(rename = "type")]
    pub datatype: DataType,
    /// Whether the column is a primary key
    pub is_primary_key: bool,
    /// Whether the column is assigned from the table's id counter when omitted
    pub is_auto_increment: bool,
    /// Whether the column allows null values
    pub is_nullable: bool,
    /// The default value of the column
    pub default: Option<Value>,
    /// Whether the column should only take unique values
    pub is_unique: bool,
    /// The table which is referenced by this foreign key
    pub references: Option<String>,
}

impl Column {
    pub fn new(name: &str, datatype: DataType) -> Self {
        Self {
            name: name.to_string(),
            datatype,
            is_primary_key: false,
            is_auto_increment: false,
            is_nullable: true,
            default: None,
            is_unique: false,
            references: None,
        }
    }

    /// Validates a column schema.
    pub fn validate(&self, table: &Table) -> Result<()> {
        if self.is_primary_key && self.is_nullable {
            return Err(Error::Validation(format!("Primary key {} cannot be nullable", self.name)));
        }
        if self.is_auto_increment && !(self.is_primary_key && self.datatype == DataType::Integer) {
            return Err(Error::Validation(format!(
                "AUTOINCREMENT column {} in table {} must be an INTEGER PRIMARY KEY",
                self.name, table.name
            )));
        }
        if let Some(default) = &self.default {
            if default.is_null() && !self.is_nullable {
                return Err(Error::Validation(format!(
                    "Default value of column {} cannot be NULL",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Validates a column value.
    pub fn validate_value(&self, table: &str, value: &Value) -> Result<()> {
        if value.is_null() && !self.is_nullable {
            return Err(Error::Constraint(format!("NOT NULL constraint failed: {}.{}", table, self.name)));
        }
        match value {
            Value::Real(f) if !f.is_finite() => {
                Err(Error::Value(format!("Non-finite value {} for column {}.{}", f, table, self.name)))
            },
            _ => Ok(()),
        }
    }
}

/// A secondary index definition. Indexes are schema metadata; unique ones
/// are enforced as constraints.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}
