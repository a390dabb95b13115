use std::fmt;

use serde_derive::{Deserialize, Serialize};

use super::format_ident;
use crate::access::Permission;
use crate::sql::types::DataType;

/// The type of a statement, as classified by its leading keyword.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Grant,
    Revoke,
    Begin,
    Commit,
    Rollback,
}

/// Statement categories, in classification order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Data manipulation
    Dml,
    /// Data definition
    Ddl,
    /// Data control
    Dcl,
    /// Transaction control
    Tcl,
}

impl StatementType {
    pub fn category(&self) -> Category {
        match self {
            Self::Select | Self::Insert | Self::Update | Self::Delete => Category::Dml,
            Self::Create | Self::Drop | Self::Alter => Category::Ddl,
            Self::Grant | Self::Revoke => Category::Dcl,
            Self::Begin | Self::Commit | Self::Rollback => Category::Tcl,
        }
    }

    /// The permission a caller needs to run a statement of this type.
    /// Transaction control needs none.
    pub fn required_permission(&self) -> Option<Permission> {
        Some(match self {
            Self::Select => Permission::Select,
            Self::Insert => Permission::Insert,
            Self::Update => Permission::Update,
            Self::Delete => Permission::Delete,
            Self::Create => Permission::Create,
            Self::Drop => Permission::Drop,
            Self::Alter => Permission::Alter,
            Self::Grant => Permission::Grant,
            Self::Revoke => Permission::Revoke,
            Self::Begin | Self::Commit | Self::Rollback => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    Rollback,

    Create(Create),
    Drop(Drop),
    Alter(Alter),

    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),

    Grant(Grant),
    Revoke(Revoke),
}

impl Statement {
    pub fn statement_type(&self) -> StatementType {
        match self {
            Self::Begin => StatementType::Begin,
            Self::Commit => StatementType::Commit,
            Self::Rollback => StatementType::Rollback,
            Self::Create(_) => StatementType::Create,
            Self::Drop(_) => StatementType::Drop,
            Self::Alter(_) => StatementType::Alter,
            Self::Select(_) => StatementType::Select,
            Self::Insert(_) => StatementType::Insert,
            Self::Update(_) => StatementType::Update,
            Self::Delete(_) => StatementType::Delete,
            Self::Grant(_) => StatementType::Grant,
            Self::Revoke(_) => StatementType::Revoke,
        }
    }
}

/// A SELECT query
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub r#where: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    /// Whether the query aggregates rows, either by grouping or by using
    /// an aggregate function in its projection.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || self.projection.iter().any(SelectItem::is_aggregate)
    }
}

/// A projection item
#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(String),
    Expression { expr: Expression, alias: Option<String> },
}

impl SelectItem {
    pub fn is_aggregate(&self) -> bool {
        match self {
            Self::Expression { expr, .. } => expr.contains_aggregate(),
            _ => false,
        }
    }
}

/// A table reference in a FROM or JOIN clause
#[derive(Clone, Debug, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Option<Expression>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub expr: Expression,
    pub direction: Direction,
}

/// Sort orders
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Conflict resolution for INSERT and UPDATE
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Conflict {
    Abort,
    Fail,
    Ignore,
    Replace,
    Rollback,
}

impl Conflict {
    pub fn from_str(word: &str) -> Option<Self> {
        Some(match word.to_uppercase().as_str() {
            "ABORT" => Self::Abort,
            "FAIL" => Self::Fail,
            "IGNORE" => Self::Ignore,
            "REPLACE" => Self::Replace,
            "ROLLBACK" => Self::Rollback,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
            Self::Fail => "FAIL",
            Self::Ignore => "IGNORE",
            Self::Replace => "REPLACE",
            Self::Rollback => "ROLLBACK",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub conflict: Option<Conflict>,
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub source: InsertSource,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expression>>),
    Select(Box<Select>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub conflict: Option<Conflict>,
    pub table: String,
    pub set: Vec<(String, Expression)>,
    pub r#where: Option<Expression>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub r#where: Option<Expression>,
}

/// Kinds of schema objects
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    Index,
    View,
    Trigger,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "TABLE",
            Self::Index => "INDEX",
            Self::View => "VIEW",
            Self::Trigger => "TRIGGER",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Create {
    pub name: String,
    pub if_not_exists: bool,
    pub temporary: bool,
    pub object: CreateObject,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CreateObject {
    Table(Vec<Column>),
    Index { table: String, columns: Vec<String>, unique: bool },
    View(Box<Select>),
    /// Trigger bodies are kept as raw text; they are never executed.
    Trigger(String),
}

impl CreateObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Table(_) => ObjectKind::Table,
            Self::Index { .. } => ObjectKind::Index,
            Self::View(_) => ObjectKind::View,
            Self::Trigger(_) => ObjectKind::Trigger,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Drop {
    pub kind: ObjectKind,
    pub name: String,
    pub if_exists: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alter {
    pub table: String,
    pub action: AlterAction,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AlterAction {
    AddColumn(Column),
    RenameTable(String),
    RenameColumn { from: String, to: String },
}

/// A column definition
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub nullable: Option<bool>,
    pub default: Option<Expression>,
    pub unique: bool,
    pub references: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: &str, datatype: DataType) -> Self {
        Self {
            name: name.to_string(),
            datatype,
            primary_key: false,
            autoincrement: false,
            nullable: None,
            default: None,
            unique: false,
            references: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForeignKey {
    pub table: String,
    pub column: Option<String>,
}

/// Privileges named by GRANT and REVOKE
#[derive(Clone, Debug, PartialEq)]
pub enum Privileges {
    All,
    List(Vec<Permission>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Grant {
    pub privileges: Privileges,
    pub on: Option<String>,
    pub grantee: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Revoke {
    pub privileges: Privileges,
    pub on: Option<String>,
    pub grantee: String,
}

/// Expressions
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Field(Option<String>, String),
    Literal(Literal),
    /// A positional `?` placeholder, numbered from 0 in order of occurrence.
    Parameter(usize),
    Function(String, Vec<Expression>),
    /// The `*` argument of COUNT(*)
    Wildcard,
    Operation(Operation),
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<Operation> for Expression {
    fn from(op: Operation) -> Self {
        Self::Operation(op)
    }
}

/// Function names treated as aggregates.
pub const AGGREGATES: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

impl Expression {
    /// Walks the expression tree, calling the visitor on every node.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expression)) {
        visitor(self);
        match self {
            Self::Function(_, args) => args.iter().for_each(|arg| arg.walk(visitor)),
            Self::Operation(op) => match op {
                Operation::And(lhs, rhs)
                | Operation::Or(lhs, rhs)
                | Operation::Equal(lhs, rhs)
                | Operation::NotEqual(lhs, rhs)
                | Operation::GreaterThan(lhs, rhs)
                | Operation::GreaterThanOrEqual(lhs, rhs)
                | Operation::LessThan(lhs, rhs)
                | Operation::LessThanOrEqual(lhs, rhs)
                | Operation::Like(lhs, rhs) => {
                    lhs.walk(visitor);
                    rhs.walk(visitor);
                },
                Operation::Not(expr) | Operation::IsNull(expr) => expr.walk(visitor),
                Operation::In(expr, list) => {
                    expr.walk(visitor);
                    list.iter().for_each(|item| item.walk(visitor));
                },
                Operation::Between(expr, low, high) => {
                    expr.walk(visitor);
                    low.walk(visitor);
                    high.walk(visitor);
                },
            },
            Self::Field(..) | Self::Literal(_) | Self::Parameter(_) | Self::Wildcard => {},
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |expr| {
            if let Self::Function(name, _) = expr {
                found |= AGGREGATES.contains(&name.to_uppercase().as_str());
            }
        });
        found
    }

    pub fn contains_field(&self) -> bool {
        let mut found = false;
        self.walk(&mut |expr| found |= matches!(expr, Self::Field(..)));
        found
    }

    /// Binding strength, used to parenthesize when rendering.
    fn precedence(&self) -> u8 {
        match self {
            Self::Operation(Operation::Or(..)) => 1,
            Self::Operation(Operation::And(..)) => 2,
            Self::Operation(Operation::Not(..)) => 3,
            Self::Operation(
                Operation::Equal(..) | Operation::NotEqual(..) | Operation::Like(..),
            ) => 4,
            Self::Operation(_) => 5,
            _ => 10,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter, parent: u8) -> fmt::Result {
        if self.precedence() <= parent {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Literals
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Operations (done by operators)
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    // Logical operators
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    // Comparison operators
    Equal(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    IsNull(Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),

    // Membership and range
    In(Box<Expression>, Vec<Expression>),
    Between(Box<Expression>, Box<Expression>, Box<Expression>),

    // String operators
    Like(Box<Expression>, Box<Expression>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(true) => f.write_str("TRUE"),
            Self::Boolean(false) => f.write_str("FALSE"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prec = self.precedence();
        match self {
            Self::Field(None, name) => f.write_str(&format_ident(name)),
            Self::Field(Some(relation), name) => {
                write!(f, "{}.{}", format_ident(relation), format_ident(name))
            },
            Self::Literal(literal) => write!(f, "{}", literal),
            Self::Parameter(_) => f.write_str("?"),
            Self::Wildcard => f.write_str("*"),
            Self::Function(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            },
            Self::Operation(op) => {
                let binary = |f: &mut fmt::Formatter, lhs: &Expression, symbol: &str, rhs: &Expression| {
                    lhs.fmt_operand(f, prec - 1)?;
                    write!(f, " {} ", symbol)?;
                    rhs.fmt_operand(f, prec)
                };
                match op {
                    Operation::And(lhs, rhs) => binary(f, lhs, "AND", rhs),
                    Operation::Or(lhs, rhs) => binary(f, lhs, "OR", rhs),
                    Operation::Equal(lhs, rhs) => binary(f, lhs, "=", rhs),
                    Operation::NotEqual(lhs, rhs) => binary(f, lhs, "!=", rhs),
                    Operation::GreaterThan(lhs, rhs) => binary(f, lhs, ">", rhs),
                    Operation::GreaterThanOrEqual(lhs, rhs) => binary(f, lhs, ">=", rhs),
                    Operation::LessThan(lhs, rhs) => binary(f, lhs, "<", rhs),
                    Operation::LessThanOrEqual(lhs, rhs) => binary(f, lhs, "<=", rhs),
                    Operation::Like(lhs, rhs) => binary(f, lhs, "LIKE", rhs),
                    Operation::Not(expr) => {
                        f.write_str("NOT ")?;
                        expr.fmt_operand(f, prec - 1)
                    },
                    Operation::IsNull(expr) => {
                        expr.fmt_operand(f, prec)?;
                        f.write_str(" IS NULL")
                    },
                    Operation::In(expr, list) => {
                        expr.fmt_operand(f, prec)?;
                        f.write_str(" IN (")?;
                        for (i, item) in list.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{}", item)?;
                        }
                        f.write_str(")")
                    },
                    Operation::Between(expr, low, high) => {
                        expr.fmt_operand(f, prec)?;
                        f.write_str(" BETWEEN ")?;
                        low.fmt_operand(f, prec)?;
                        f.write_str(" AND ")?;
                        high.fmt_operand(f, prec)
                    },
                }
            },
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&format_ident(&self.name))?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", format_ident(alias))?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("*"),
            Self::QualifiedWildcard(relation) => write!(f, "{}.*", format_ident(relation)),
            Self::Expression { expr, alias: None } => write!(f, "{}", expr),
            Self::Expression { expr, alias: Some(alias) } => {
                write!(f, "{} AS {}", expr, format_ident(alias))
            },
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_idents(f: &mut fmt::Formatter, idents: &[String]) -> fmt::Result {
    write_list(f, &idents.iter().map(|i| format_ident(i)).collect::<Vec<_>>())
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.projection)?;
        if let Some(from) = &self.from {
            write!(f, " FROM {}", from)?;
        }
        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
                JoinKind::Cross => "CROSS JOIN",
            };
            write!(f, " {} {}", kind, join.table)?;
            if let Some(on) = &join.on {
                write!(f, " ON {}", on)?;
            }
        }
        if let Some(expr) = &self.r#where {
            write!(f, " WHERE {}", expr)?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(expr) = &self.having {
            write!(f, " HAVING {}", expr)?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", order.expr)?;
                if order.direction == Direction::Descending {
                    f.write_str(" DESC")?;
                }
            }
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", format_ident(&self.name), self.datatype)?;
        if self.primary_key {
            f.write_str(" PRIMARY KEY")?;
        }
        if self.autoincrement {
            f.write_str(" AUTOINCREMENT")?;
        }
        match self.nullable {
            Some(false) => f.write_str(" NOT NULL")?,
            Some(true) => f.write_str(" NULL")?,
            None => {},
        }
        if self.unique {
            f.write_str(" UNIQUE")?;
        }
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {}", default)?;
        }
        if let Some(reference) = &self.references {
            write!(f, " REFERENCES {}", format_ident(&reference.table))?;
            if let Some(column) = &reference.column {
                write!(f, "({})", format_ident(column))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::List(permissions) => write_list(f, permissions),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("BEGIN"),
            Self::Commit => f.write_str("COMMIT"),
            Self::Rollback => f.write_str("ROLLBACK"),

            Self::Select(select) => write!(f, "{}", select),

            Self::Insert(insert) => {
                f.write_str("INSERT ")?;
                if let Some(conflict) = insert.conflict {
                    write!(f, "OR {} ", conflict.as_str())?;
                }
                write!(f, "INTO {}", format_ident(&insert.table))?;
                if let Some(columns) = &insert.columns {
                    f.write_str(" (")?;
                    write_idents(f, columns)?;
                    f.write_str(")")?;
                }
                match &insert.source {
                    InsertSource::Values(rows) => {
                        f.write_str(" VALUES ")?;
                        for (i, row) in rows.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            f.write_str("(")?;
                            write_list(f, row)?;
                            f.write_str(")")?;
                        }
                        Ok(())
                    },
                    InsertSource::Select(select) => write!(f, " {}", select),
                }
            },

            Self::Update(update) => {
                f.write_str("UPDATE ")?;
                if let Some(conflict) = update.conflict {
                    write!(f, "OR {} ", conflict.as_str())?;
                }
                write!(f, "{} SET ", format_ident(&update.table))?;
                for (i, (column, expr)) in update.set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", format_ident(column), expr)?;
                }
                if let Some(expr) = &update.r#where {
                    write!(f, " WHERE {}", expr)?;
                }
                Ok(())
            },

            Self::Delete(delete) => {
                write!(f, "DELETE FROM {}", format_ident(&delete.table))?;
                if let Some(expr) = &delete.r#where {
                    write!(f, " WHERE {}", expr)?;
                }
                Ok(())
            },

            Self::Create(create) => {
                f.write_str("CREATE ")?;
                if create.temporary {
                    f.write_str("TEMPORARY ")?;
                }
                if let CreateObject::Index { unique: true, .. } = create.object {
                    f.write_str("UNIQUE ")?;
                }
                write!(f, "{} ", create.object.kind())?;
                if create.if_not_exists {
                    f.write_str("IF NOT EXISTS ")?;
                }
                f.write_str(&format_ident(&create.name))?;
                match &create.object {
                    CreateObject::Table(columns) => {
                        f.write_str(" (")?;
                        write_list(f, columns)?;
                        f.write_str(")")
                    },
                    CreateObject::Index { table, columns, .. } => {
                        write!(f, " ON {} (", format_ident(table))?;
                        write_idents(f, columns)?;
                        f.write_str(")")
                    },
                    CreateObject::View(select) => write!(f, " AS {}", select),
                    CreateObject::Trigger(body) => write!(f, " {}", body),
                }
            },

            Self::Drop(drop) => {
                write!(f, "DROP {} ", drop.kind)?;
                if drop.if_exists {
                    f.write_str("IF EXISTS ")?;
                }
                f.write_str(&format_ident(&drop.name))
            },

            Self::Alter(alter) => {
                write!(f, "ALTER TABLE {} ", format_ident(&alter.table))?;
                match &alter.action {
                    AlterAction::AddColumn(column) => write!(f, "ADD COLUMN {}", column),
                    AlterAction::RenameTable(name) => write!(f, "RENAME TO {}", format_ident(name)),
                    AlterAction::RenameColumn { from, to } => write!(
                        f,
                        "RENAME COLUMN {} TO {}",
                        format_ident(from),
                        format_ident(to)
                    ),
                }
            },

            Self::Grant(grant) => {
                write!(f, "GRANT {}", grant.privileges)?;
                if let Some(on) = &grant.on {
                    write!(f, " ON {}", format_ident(on))?;
                }
                write!(f, " TO {}", format_ident(&grant.grantee))
            },

            Self::Revoke(revoke) => {
                write!(f, "REVOKE {}", revoke.privileges)?;
                if let Some(on) = &revoke.on {
                    write!(f, " ON {}", format_ident(on))?;
                }
                write!(f, " FROM {}", format_ident(&revoke.grantee))
            },
        }
    }
}
