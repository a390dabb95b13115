//! Fluent builders for common statements. A builder assembles a statement
//! tree with `?` placeholders for every value, and renders it to SQL text
//! plus the matching parameter list. Builder methods consume and return the
//! builder; only `to_sql` and `execute` do anything beyond that.
use super::parser::ast::{self, Conflict, Direction, Expression, JoinKind, Literal, Operation};
use super::types::{DataType, Value};
use crate::access::Caller;
use crate::database::{Database, ExecuteResult};

/// A statement builder
pub trait Builder {
    /// Builds the statement and its parameters, in placeholder order.
    fn build(&self) -> (ast::Statement, Vec<Value>);

    /// Renders the statement as SQL text with its parameters.
    fn to_sql(&self) -> (String, Vec<Value>) {
        let (statement, params) = self.build();
        (statement.to_string(), params)
    }

    /// Executes the statement against a database.
    fn execute(&self, db: &mut Database, caller: &Caller) -> ExecuteResult {
        let (sql, params) = self.to_sql();
        db.execute(&sql, &params, caller)
    }
}

/// Parses a possibly qualified `relation.column` reference.
fn field(column: &str) -> Expression {
    match column.split_once('.') {
        Some((relation, name)) => Expression::Field(Some(relation.to_string()), name.to_string()),
        None => Expression::Field(None, column.to_string()),
    }
}

fn literal(value: &Value) -> Expression {
    Expression::Literal(match value {
        Value::Null => Literal::Null,
        Value::Integer(i) => Literal::Integer(*i),
        Value::Real(f) => Literal::Float(*f),
        Value::Text(s) => Literal::String(s.clone()),
    })
}

// Placeholders render as `?` whatever their number, so builders only need
// to keep parameters in rendering order.
fn param() -> Box<Expression> {
    Box::new(Expression::Parameter(0))
}

/// A row condition, as used by WHERE, HAVING and JOIN ... ON
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    expr: Expression,
    params: Vec<Value>,
}

type BinaryOp = fn(Box<Expression>, Box<Expression>) -> Operation;

impl Condition {
    fn compare(column: &str, value: Value, op: BinaryOp) -> Self {
        Self { expr: op(Box::new(field(column)), param()).into(), params: vec![value] }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, value.into(), Operation::Equal)
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, value.into(), Operation::NotEqual)
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, value.into(), Operation::LessThan)
    }

    pub fn le(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, value.into(), Operation::LessThanOrEqual)
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, value.into(), Operation::GreaterThan)
    }

    pub fn ge(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, value.into(), Operation::GreaterThanOrEqual)
    }

    pub fn like(column: &str, pattern: &str) -> Self {
        Self::compare(column, pattern.into(), Operation::Like)
    }

    pub fn is_in(column: &str, values: Vec<Value>) -> Self {
        let list = values.iter().map(|_| *param()).collect();
        Self { expr: Operation::In(Box::new(field(column)), list).into(), params: values }
    }

    pub fn between(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            expr: Operation::Between(Box::new(field(column)), param(), param()).into(),
            params: vec![low.into(), high.into()],
        }
    }

    pub fn is_null(column: &str) -> Self {
        Self { expr: Operation::IsNull(Box::new(field(column))).into(), params: vec![] }
    }

    pub fn not_null(column: &str) -> Self {
        Self::is_null(column).negate()
    }

    /// Compares two columns, as in a join condition.
    pub fn columns_eq(left: &str, right: &str) -> Self {
        Self { expr: Operation::Equal(Box::new(field(left)), Box::new(field(right))).into(), params: vec![] }
    }

    pub fn and(mut self, other: Condition) -> Self {
        self.params.extend(other.params);
        Self { expr: Operation::And(Box::new(self.expr), Box::new(other.expr)).into(), params: self.params }
    }

    pub fn or(mut self, other: Condition) -> Self {
        self.params.extend(other.params);
        Self { expr: Operation::Or(Box::new(self.expr), Box::new(other.expr)).into(), params: self.params }
    }

    pub fn negate(self) -> Self {
        Self { expr: Operation::Not(Box::new(self.expr)).into(), params: self.params }
    }
}

/// ANDs a condition onto an optional one.
fn conjoin(existing: Option<Condition>, condition: Condition) -> Option<Condition> {
    Some(match existing {
        Some(existing) => existing.and(condition),
        None => condition,
    })
}

fn split(condition: &Option<Condition>, params: &mut Vec<Value>) -> Option<Expression> {
    condition.as_ref().map(|c| {
        params.extend(c.params.iter().cloned());
        c.expr.clone()
    })
}

/// Starts a SELECT of the given columns. No columns selects `*`.
pub fn select(columns: &[&str]) -> QueryBuilder {
    let projection = match columns {
        [] => vec![ast::SelectItem::Wildcard],
        columns => columns
            .iter()
            .map(|c| match *c {
                "*" => ast::SelectItem::Wildcard,
                c => ast::SelectItem::Expression { expr: field(c), alias: None },
            })
            .collect(),
    };
    QueryBuilder { select: ast::Select { projection, ..Default::default() }, joins: vec![], filter: None, having: None }
}

/// A SELECT builder
#[derive(Clone, Debug, PartialEq)]
pub struct QueryBuilder {
    select: ast::Select,
    joins: Vec<(JoinKind, ast::TableRef, Option<Condition>)>,
    filter: Option<Condition>,
    having: Option<Condition>,
}

impl QueryBuilder {
    pub fn from(mut self, table: &str) -> Self {
        self.select.from = Some(ast::TableRef { name: table.to_string(), alias: None });
        self
    }

    pub fn from_as(mut self, table: &str, alias: &str) -> Self {
        self.select.from = Some(ast::TableRef { name: table.to_string(), alias: Some(alias.to_string()) });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.select.distinct = true;
        self
    }

    /// Adds a column under an output alias.
    pub fn column_as(mut self, column: &str, alias: &str) -> Self {
        self.select.projection.push(ast::SelectItem::Expression { expr: field(column), alias: Some(alias.to_string()) });
        self
    }

    /// Adds an aggregate function call, e.g. `("COUNT", "*")`.
    pub fn aggregate(mut self, function: &str, column: &str, alias: Option<&str>) -> Self {
        let arg = match column {
            "*" => Expression::Wildcard,
            column => field(column),
        };
        self.select.projection.push(ast::SelectItem::Expression {
            expr: Expression::Function(function.to_uppercase(), vec![arg]),
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn join(mut self, kind: JoinKind, table: &str, alias: Option<&str>, on: Option<Condition>) -> Self {
        let table = ast::TableRef { name: table.to_string(), alias: alias.map(str::to_string) };
        self.joins.push((kind, table, on));
        self
    }

    /// Adds a WHERE condition, ANDed with any previous one.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = conjoin(self.filter, condition);
        self
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.select.group_by.push(field(column));
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = conjoin(self.having, condition);
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.select.order_by.push(ast::OrderBy { expr: field(column), direction });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.select.offset = Some(offset);
        self
    }

    fn build_select(&self) -> (ast::Select, Vec<Value>) {
        let mut select = self.select.clone();
        let mut params = vec![];
        for (kind, table, on) in &self.joins {
            let on = split(on, &mut params);
            select.joins.push(ast::Join { kind: *kind, table: table.clone(), on });
        }
        select.r#where = split(&self.filter, &mut params);
        select.having = split(&self.having, &mut params);
        (select, params)
    }
}

impl Builder for QueryBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        let (select, params) = self.build_select();
        (ast::Statement::Select(select), params)
    }
}

/// Starts an INSERT into a table.
pub fn insert_into(table: &str) -> InsertBuilder {
    InsertBuilder { table: table.to_string(), columns: None, rows: vec![], select: None, conflict: None }
}

/// An INSERT builder
#[derive(Clone, Debug, PartialEq)]
pub struct InsertBuilder {
    table: String,
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
    select: Option<QueryBuilder>,
    conflict: Option<Conflict>,
}

impl InsertBuilder {
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Adds a row of values.
    pub fn values(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Inserts the results of a query instead of literal rows.
    pub fn select(mut self, query: QueryBuilder) -> Self {
        self.select = Some(query);
        self
    }

    pub fn on_conflict(mut self, conflict: Conflict) -> Self {
        self.conflict = Some(conflict);
        self
    }
}

impl Builder for InsertBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        let (source, params) = match &self.select {
            Some(query) => {
                let (select, params) = query.build_select();
                (ast::InsertSource::Select(Box::new(select)), params)
            },
            None => (
                ast::InsertSource::Values(
                    self.rows.iter().map(|row| row.iter().map(|_| *param()).collect()).collect(),
                ),
                self.rows.iter().flatten().cloned().collect(),
            ),
        };
        let insert = ast::Insert {
            conflict: self.conflict,
            table: self.table.clone(),
            columns: self.columns.clone(),
            source,
        };
        (ast::Statement::Insert(insert), params)
    }
}

/// Starts an UPDATE of a table.
pub fn update(table: &str) -> UpdateBuilder {
    UpdateBuilder { table: table.to_string(), set: vec![], filter: None, conflict: None }
}

/// An UPDATE builder
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateBuilder {
    table: String,
    set: Vec<(String, Value)>,
    filter: Option<Condition>,
    conflict: Option<Conflict>,
}

impl UpdateBuilder {
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set.push((column.to_string(), value.into()));
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = conjoin(self.filter, condition);
        self
    }

    pub fn on_conflict(mut self, conflict: Conflict) -> Self {
        self.conflict = Some(conflict);
        self
    }
}

impl Builder for UpdateBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        let mut params: Vec<Value> = self.set.iter().map(|(_, v)| v.clone()).collect();
        let update = ast::Update {
            conflict: self.conflict,
            table: self.table.clone(),
            set: self.set.iter().map(|(c, _)| (c.clone(), *param())).collect(),
            r#where: split(&self.filter, &mut params),
        };
        (ast::Statement::Update(update), params)
    }
}

/// Starts a DELETE from a table.
pub fn delete_from(table: &str) -> DeleteBuilder {
    DeleteBuilder { table: table.to_string(), filter: None }
}

/// A DELETE builder
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteBuilder {
    table: String,
    filter: Option<Condition>,
}

impl DeleteBuilder {
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = conjoin(self.filter, condition);
        self
    }
}

impl Builder for DeleteBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        let mut params = vec![];
        let delete = ast::Delete { table: self.table.clone(), r#where: split(&self.filter, &mut params) };
        (ast::Statement::Delete(delete), params)
    }
}

/// Starts a column definition.
pub fn column(name: &str, datatype: DataType) -> ColumnBuilder {
    ColumnBuilder { column: ast::Column::new(name, datatype) }
}

/// A column definition builder
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnBuilder {
    column: ast::Column,
}

impl ColumnBuilder {
    pub fn primary_key(mut self) -> Self {
        self.column.primary_key = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.column.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.column.nullable = Some(false);
        self
    }

    pub fn unique(mut self) -> Self {
        self.column.unique = true;
        self
    }

    /// Sets a default, rendered as a literal since DDL takes no parameters.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.column.default = Some(literal(&value.into()));
        self
    }

    pub fn references(mut self, table: &str, column: Option<&str>) -> Self {
        self.column.references =
            Some(ast::ForeignKey { table: table.to_string(), column: column.map(str::to_string) });
        self
    }
}

/// Starts a CREATE TABLE.
pub fn create_table(name: &str) -> TableBuilder {
    TableBuilder { name: name.to_string(), if_not_exists: false, columns: vec![] }
}

/// A CREATE TABLE builder
#[derive(Clone, Debug, PartialEq)]
pub struct TableBuilder {
    name: String,
    if_not_exists: bool,
    columns: Vec<ast::Column>,
}

impl TableBuilder {
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn column(mut self, column: ColumnBuilder) -> Self {
        self.columns.push(column.column);
        self
    }
}

impl Builder for TableBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        let create = ast::Create {
            name: self.name.clone(),
            if_not_exists: self.if_not_exists,
            temporary: false,
            object: ast::CreateObject::Table(self.columns.clone()),
        };
        (ast::Statement::Create(create), vec![])
    }
}

/// Starts a CREATE INDEX.
pub fn create_index(name: &str, table: &str, columns: &[&str]) -> IndexBuilder {
    IndexBuilder {
        name: name.to_string(),
        table: table.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        unique: false,
        if_not_exists: false,
    }
}

/// A CREATE INDEX builder
#[derive(Clone, Debug, PartialEq)]
pub struct IndexBuilder {
    name: String,
    table: String,
    columns: Vec<String>,
    unique: bool,
    if_not_exists: bool,
}

impl IndexBuilder {
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

impl Builder for IndexBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        let create = ast::Create {
            name: self.name.clone(),
            if_not_exists: self.if_not_exists,
            temporary: false,
            object: ast::CreateObject::Index {
                table: self.table.clone(),
                columns: self.columns.clone(),
                unique: self.unique,
            },
        };
        (ast::Statement::Create(create), vec![])
    }
}

/// Starts a DROP TABLE.
pub fn drop_table(name: &str) -> DropBuilder {
    DropBuilder { drop: ast::Drop { kind: ast::ObjectKind::Table, name: name.to_string(), if_exists: false } }
}

/// Starts a DROP INDEX.
pub fn drop_index(name: &str) -> DropBuilder {
    DropBuilder { drop: ast::Drop { kind: ast::ObjectKind::Index, name: name.to_string(), if_exists: false } }
}

/// A DROP builder
#[derive(Clone, Debug, PartialEq)]
pub struct DropBuilder {
    drop: ast::Drop,
}

impl DropBuilder {
    pub fn if_exists(mut self) -> Self {
        self.drop.if_exists = true;
        self
    }
}

impl Builder for DropBuilder {
    fn build(&self) -> (ast::Statement, Vec<Value>) {
        (ast::Statement::Drop(self.drop.clone()), vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::sql::parser;

    #[test]
    fn select_sql() {
        let query = select(&["name", "age"])
            .from("users")
            .filter(Condition::gt("age", 25).and(Condition::eq("name", "Bob")))
            .order_by("age", Direction::Descending)
            .limit(10);
        assert_eq!(
            query.to_sql(),
            (
                "SELECT name, age FROM users WHERE age > ? AND name = ? ORDER BY age DESC LIMIT 10".to_string(),
                vec![Value::Integer(25), Value::from("Bob")]
            )
        );
    }

    #[test]
    fn parameters_follow_rendering_order() -> Result<()> {
        // The WHERE is given before the join, but renders after it.
        let query = select(&[])
            .from_as("orders", "o")
            .filter(Condition::is_in("o.status", vec!["new".into(), "paid".into()]))
            .join(
                JoinKind::Left,
                "users",
                Some("u"),
                Some(Condition::columns_eq("u.id", "o.user_id").and(Condition::ne("u.name", "root"))),
            );
        let (sql, params) = query.to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM orders AS o LEFT JOIN users AS u ON u.id = o.user_id AND u.name != ? \
             WHERE o.status IN (?, ?)"
        );
        assert_eq!(params, vec![Value::from("root"), Value::from("new"), Value::from("paid")]);
        assert_eq!(parser::parse(&sql)?.parameters, params.len());
        Ok(())
    }

    #[test]
    fn mutation_sql() -> Result<()> {
        let (sql, params) = insert_into("users")
            .columns(&["name", "age"])
            .values(vec!["Alice".into(), 30.into()])
            .values(vec!["Bob".into(), 25.into()])
            .on_conflict(Conflict::Ignore)
            .to_sql();
        assert_eq!(sql, "INSERT OR IGNORE INTO users (name, age) VALUES (?, ?), (?, ?)");
        assert_eq!(params.len(), 4);

        let (sql, params) = update("users")
            .set("age", 31)
            .filter(Condition::between("age", 20, 40).or(Condition::is_null("age")))
            .to_sql();
        assert_eq!(sql, "UPDATE users SET age = ? WHERE age BETWEEN ? AND ? OR age IS NULL");
        assert_eq!(params, vec![Value::Integer(31), Value::Integer(20), Value::Integer(40)]);

        let (sql, params) = delete_from("users").filter(Condition::like("name", "A%")).to_sql();
        assert_eq!(sql, "DELETE FROM users WHERE name LIKE ?");
        assert_eq!(params, vec![Value::from("A%")]);
        Ok(())
    }

    #[test]
    fn schema_sql() {
        let (sql, params) = create_table("users")
            .if_not_exists()
            .column(column("id", DataType::Integer).primary_key().autoincrement())
            .column(column("name", DataType::Text).not_null().unique())
            .column(column("role", DataType::Text).default("viewer"))
            .to_sql();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             name TEXT NOT NULL UNIQUE, role TEXT DEFAULT 'viewer')"
        );
        assert!(params.is_empty());

        assert_eq!(drop_table("users").if_exists().to_sql().0, "DROP TABLE IF EXISTS users");
        assert_eq!(
            create_index("by_name", "users", &["name"]).unique().to_sql().0,
            "CREATE UNIQUE INDEX by_name ON users (name)"
        );
    }

    #[test]
    fn execute() {
        let mut db = Database::in_memory();
        let caller = Caller::Local;
        create_table("t")
            .column(column("id", DataType::Integer).primary_key())
            .column(column("name", DataType::Text))
            .execute(&mut db, &caller);
        let result = insert_into("t").columns(&["name"]).values(vec!["x'); DROP TABLE t; --".into()]).execute(&mut db, &caller);
        assert!(result.success);
        let result = select(&["name"]).from("t").execute(&mut db, &caller);
        assert_eq!(result.row_count, Some(1));
        assert_eq!(db.list_tables(), vec!["t".to_string()]);

        let result = update("t").set("name", "y").filter(Condition::eq("id", 1)).execute(&mut db, &caller);
        assert_eq!(result.changes, Some(1));
        let result = select(&[]).from("t").aggregate("count", "*", Some("n")).execute(&mut db, &caller);
        assert!(!result.success, "wildcard with aggregates is rejected");
        let result = select(&["name"]).from("t").aggregate("count", "*", Some("n")).group_by("name").execute(&mut db, &caller);
        assert_eq!(result.rows.map(|rows| rows[0].get("n").cloned()), Some(Some(Value::Integer(1))));
    }
}
