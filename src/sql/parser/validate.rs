use std::collections::HashSet;

use super::ast::{CreateObject, InsertSource, SelectItem, Statement};
use crate::error::{Error, Result};
use crate::sql::types::DataType;

/// Diagnostics for a parsed statement. Errors prevent execution, warnings
/// are informational.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Validation {
    pub errors: Vec<Error>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the first error, if any.
    pub fn check(&self) -> Result<()> {
        match self.errors.first() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn error(&mut self, err: Error) {
        self.errors.push(err)
    }

    fn warn(&mut self, warning: String) {
        self.warnings.push(warning)
    }
}

/// Checks a statement for structural problems that parsing alone doesn't catch.
pub fn validate(statement: &Statement) -> Validation {
    let mut v = Validation::default();
    match statement {
        Statement::Select(select) => {
            if select.projection.iter().any(|item| matches!(item, SelectItem::Wildcard)) {
                v.warn("SELECT * fetches every column; consider naming the columns".into());
            }
            if select.from.is_none() {
                let references_columns = select.projection.iter().any(|item| match item {
                    SelectItem::Expression { expr, .. } => expr.contains_field(),
                    _ => true,
                });
                if references_columns || select.r#where.as_ref().map_or(false, |e| e.contains_field()) {
                    v.error(Error::Validation("SELECT is missing a table reference".into()));
                }
            }
            if select.having.is_some() && !select.is_aggregate() {
                v.error(Error::Validation("HAVING requires GROUP BY or an aggregate".into()));
            }
        },

        Statement::Insert(insert) => match (&insert.columns, &insert.source) {
            (Some(columns), _) if columns.is_empty() => {
                v.error(Error::Validation("INSERT column list is empty".into()))
            },
            (Some(columns), InsertSource::Values(rows)) => {
                if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
                    v.error(Error::ColumnCountMismatch { columns: columns.len(), values: row.len() });
                }
            },
            (None, InsertSource::Values(rows)) => {
                if rows.iter().any(|row| row.len() != rows[0].len()) {
                    v.error(Error::Validation("VALUES rows must all have the same length".into()));
                }
            },
            (Some(columns), InsertSource::Select(select)) => {
                let exact = select.projection.iter().all(|item| matches!(item, SelectItem::Expression { .. }));
                if exact && select.projection.len() != columns.len() {
                    v.error(Error::ColumnCountMismatch {
                        columns: columns.len(),
                        values: select.projection.len(),
                    });
                }
            },
            (None, InsertSource::Select(_)) => {},
        },

        Statement::Update(update) => {
            if update.r#where.is_none() {
                v.warn(format!("UPDATE without WHERE modifies every row of {}", update.table));
            }
        },

        Statement::Delete(delete) => {
            if delete.r#where.is_none() {
                v.warn(format!("DELETE without WHERE removes every row of {}", delete.table));
            }
        },

        Statement::Create(create) => match &create.object {
            CreateObject::Table(columns) => {
                if columns.is_empty() {
                    v.error(Error::Validation(format!("Table {} has no columns", create.name)));
                }
                let mut names = HashSet::new();
                for column in columns {
                    if !names.insert(column.name.as_str()) {
                        v.error(Error::Validation(format!("Duplicate column {}", column.name)));
                    }
                    if column.autoincrement && !(column.primary_key && column.datatype == DataType::Integer) {
                        v.error(Error::Validation(format!(
                            "AUTOINCREMENT is only allowed on an INTEGER PRIMARY KEY, not {}",
                            column.name
                        )));
                    }
                }
                match columns.iter().filter(|c| c.primary_key).count() {
                    0 if !columns.is_empty() => v.warn(format!(
                        "Table {} has no primary key; an id column will be added",
                        create.name
                    )),
                    0 | 1 => {},
                    _ => v.error(Error::Validation(format!("Table {} has multiple primary keys", create.name))),
                }
            },
            CreateObject::Index { columns, .. } if columns.is_empty() => {
                v.error(Error::Validation(format!("Index {} has no columns", create.name)))
            },
            _ => {},
        },

        Statement::Alter(_)
        | Statement::Drop(_)
        | Statement::Grant(_)
        | Statement::Revoke(_)
        | Statement::Begin
        | Statement::Commit
        | Statement::Rollback => {},
    }
    v
}
