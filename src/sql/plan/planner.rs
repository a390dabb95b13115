use std::collections::{HashMap, HashSet};

use super::{Alteration, Node, Plan};
use crate::error::{Error, Result};
use crate::sql::parser::ast;
use crate::sql::schema::{Catalog, Column, Index, Table};
use crate::sql::types::{Aggregate, DataType, Operand, Predicate, Value};

/// A query plan builder.
pub struct Planner<'a, C: Catalog> {
    catalog: &'a C,
    params: &'a [Value],
}

impl<'a, C: Catalog> Planner<'a, C> {
    /// Creates a new planner, binding placeholders to the given parameters.
    pub fn new(catalog: &'a C, params: &'a [Value]) -> Self {
        Self { catalog, params }
    }

    /// Builds a plan for an AST statement.
    pub fn build(&self, statement: &ast::Statement) -> Result<Plan> {
        Ok(Plan { node: self.build_statement(statement)? })
    }

    /// Builds a plan node for an AST statement.
    fn build_statement(&self, statement: &ast::Statement) -> Result<Node> {
        Ok(match statement {
            // Transaction control and access control are handled by the database.
            ast::Statement::Begin
            | ast::Statement::Commit
            | ast::Statement::Rollback
            | ast::Statement::Grant(_)
            | ast::Statement::Revoke(_) => {
                return Err(Error::Internal(format!("Unexpected {} statement", statement.statement_type())))
            },

            // DDL statements (schema changes).
            ast::Statement::Create(create) => match &create.object {
                ast::CreateObject::Table(columns) => Node::CreateTable {
                    schema: Table::new(
                        &create.name,
                        columns.iter().map(|c| self.build_column(c)).collect::<Result<_>>()?,
                    )?,
                    if_not_exists: create.if_not_exists,
                },
                ast::CreateObject::Index { table, columns, unique } => Node::CreateIndex {
                    table: table.clone(),
                    index: Index { name: create.name.clone(), columns: columns.clone(), unique: *unique },
                    if_not_exists: create.if_not_exists,
                },
                object => return Err(Error::Unsupported(format!("CREATE {}", object.kind()))),
            },
            ast::Statement::Drop(drop) => match drop.kind {
                ast::ObjectKind::Table => Node::DropTable { table: drop.name.clone(), if_exists: drop.if_exists },
                ast::ObjectKind::Index => Node::DropIndex { name: drop.name.clone(), if_exists: drop.if_exists },
                kind => return Err(Error::Unsupported(format!("DROP {}", kind))),
            },
            ast::Statement::Alter(alter) => Node::AlterTable {
                table: alter.table.clone(),
                alteration: match &alter.action {
                    ast::AlterAction::AddColumn(column) => {
                        let column = self.build_column(column)?;
                        if column.is_primary_key {
                            return Err(Error::Validation(format!(
                                "Cannot add PRIMARY KEY column {}",
                                column.name
                            )));
                        }
                        Alteration::AddColumn(column)
                    },
                    ast::AlterAction::RenameTable(name) => Alteration::RenameTable(name.clone()),
                    ast::AlterAction::RenameColumn { from, to } => {
                        Alteration::RenameColumn { from: from.clone(), to: to.clone() }
                    },
                },
            },

            // DML statements (mutations).
            ast::Statement::Insert(insert) => {
                let table = self.catalog.assert_read_table(&insert.table)?;
                if let Some(columns) = &insert.columns {
                    let mut seen = HashSet::new();
                    for column in columns {
                        table.get_column_index(column)?;
                        if !seen.insert(column) {
                            return Err(Error::Validation(format!("Column {} given multiple times", column)));
                        }
                    }
                }
                let source = match &insert.source {
                    ast::InsertSource::Values(rows) => Node::Values {
                        rows: rows
                            .iter()
                            .map(|row| row.iter().map(|e| self.evaluate_constant(e)).collect::<Result<Vec<_>>>())
                            .collect::<Result<_>>()?,
                    },
                    ast::InsertSource::Select(select) => self.build_select(select)?,
                };
                Node::Insert {
                    table: table.name,
                    columns: insert.columns.clone(),
                    source: Box::new(source),
                    conflict: insert.conflict.unwrap_or(ast::Conflict::Abort),
                }
            },
            ast::Statement::Update(update) => {
                let table = self.catalog.assert_read_table(&update.table)?;
                let scope = Scope::from_table(&table, None)?;
                Node::Update {
                    filter: self.build_filter(update.r#where.as_ref(), &scope)?,
                    set: update
                        .set
                        .iter()
                        .map(|(column, expr)| {
                            Ok((table.get_column_index(column)?, self.build_operand(expr, &scope)?))
                        })
                        .collect::<Result<_>>()?,
                    conflict: update.conflict.unwrap_or(ast::Conflict::Abort),
                    table: table.name,
                }
            },
            ast::Statement::Delete(delete) => {
                let table = self.catalog.assert_read_table(&delete.table)?;
                let scope = Scope::from_table(&table, None)?;
                Node::Delete { filter: self.build_filter(delete.r#where.as_ref(), &scope)?, table: table.name }
            },

            ast::Statement::Select(select) => self.build_select(select)?,
        })
    }

    /// Builds a column schema from a column definition. An INTEGER PRIMARY
    /// KEY is assigned from the table's id counter when omitted.
    fn build_column(&self, column: &ast::Column) -> Result<Column> {
        let is_nullable = column.nullable.unwrap_or(!column.primary_key);
        let default = match &column.default {
            Some(expr) => Some(self.evaluate_constant(expr)?.coerce(column.datatype)),
            None => None,
        };
        Ok(Column {
            name: column.name.clone(),
            datatype: column.datatype,
            is_primary_key: column.primary_key,
            is_auto_increment: column.autoincrement
                || (column.primary_key && column.datatype == DataType::Integer),
            is_nullable,
            default,
            is_unique: column.unique,
            references: column.references.as_ref().map(|r| r.table.clone()),
        })
    }

    /// Builds a SELECT query. The output is a projection whose expressions
    /// carry the result column labels.
    fn build_select(&self, select: &ast::Select) -> Result<Node> {
        let (mut node, mut scope) = match &select.from {
            Some(from) => {
                let table = self.catalog.assert_read_table(&from.name)?;
                let scope = Scope::from_table(&table, from.alias.as_deref())?;
                (Node::Scan { table: table.name, alias: from.alias.clone() }, scope)
            },
            None => (Node::Nothing, Scope::default()),
        };

        for join in &select.joins {
            let table = self.catalog.assert_read_table(&join.table.name)?;
            scope.merge(Scope::from_table(&table, join.table.alias.as_deref())?)?;
            node = Node::NestedLoopJoin {
                left: Box::new(node),
                right: Box::new(Node::Scan { table: table.name, alias: join.table.alias.clone() }),
                predicate: self.build_filter(join.on.as_ref(), &scope)?,
                kind: join.kind,
            };
        }

        if let Some(expr) = &select.r#where {
            if expr.contains_aggregate() {
                return Err(Error::Validation("Aggregate functions are not allowed in WHERE".into()));
            }
            node = Node::Filter { source: Box::new(node), predicate: self.build_predicate(expr, &scope)? };
        }

        let aggregated = select.is_aggregate() || select.having.is_some();
        if aggregated {
            let (aggregation, grouped) = self.build_aggregation(select, node, &scope)?;
            node = aggregation;
            scope = grouped;
            if let Some(having) = &select.having {
                node = Node::Filter { source: Box::new(node), predicate: self.build_predicate(having, &scope)? };
            }
        }

        // Build the projection, qualifying duplicate labels where possible.
        let mut expressions: Vec<(Operand, String)> = vec![];
        let mut qualifiers: Vec<Option<String>> = vec![];
        for item in &select.projection {
            match item {
                ast::SelectItem::Wildcard | ast::SelectItem::QualifiedWildcard(_) if aggregated => {
                    return Err(Error::Validation("* is not allowed in an aggregate query".into()))
                },
                ast::SelectItem::Wildcard => {
                    if select.from.is_none() {
                        return Err(Error::Validation("SELECT * requires a FROM table".into()));
                    }
                    for (i, (relation, name)) in scope.columns.iter().enumerate() {
                        expressions.push((Operand::Column(i), name.clone()));
                        qualifiers.push(relation.clone());
                    }
                },
                ast::SelectItem::QualifiedWildcard(table) => {
                    if !scope.tables.contains(table) {
                        return Err(Error::TableNotFound(table.clone()));
                    }
                    for (i, (relation, name)) in scope.columns.iter().enumerate() {
                        if relation.as_deref() == Some(table.as_str()) {
                            expressions.push((Operand::Column(i), name.clone()));
                            qualifiers.push(relation.clone());
                        }
                    }
                },
                ast::SelectItem::Expression { expr, alias } => {
                    let operand = self.build_operand(expr, &scope)?;
                    let (label, qualifier) = match (alias, expr, &operand) {
                        (Some(alias), _, _) => (alias.clone(), None),
                        (None, ast::Expression::Field(_, name), Operand::Column(i)) => {
                            (name.clone(), scope.columns[*i].0.clone())
                        },
                        (None, expr, _) => (expr.to_string(), None),
                    };
                    expressions.push((operand, label));
                    qualifiers.push(qualifier);
                },
            }
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        for ((_, label), qualifier) in expressions.iter_mut().zip(qualifiers) {
            let count = seen.entry(label.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                *label = match qualifier {
                    Some(relation) => format!("{}.{}", relation, label),
                    None => format!("{}:{}", label, *count - 1),
                };
            }
        }

        // Resolve ORDER BY terms against output labels, positions, or source
        // columns. The latter are carried as hidden trailing columns.
        let visible = expressions.len();
        let mut orders = vec![];
        for order in &select.order_by {
            let index = match &order.expr {
                ast::Expression::Literal(ast::Literal::Integer(n)) => match usize::try_from(*n) {
                    Ok(n) if n >= 1 && n <= visible => n - 1,
                    _ => return Err(Error::Validation(format!("ORDER BY position {} is out of range", n))),
                },
                expr => {
                    let label = match expr {
                        ast::Expression::Field(None, name) => {
                            expressions[..visible].iter().position(|(_, label)| label == name)
                        },
                        _ => None,
                    };
                    match label {
                        Some(index) => index,
                        None => {
                            let operand = self.build_operand(expr, &scope)?;
                            match expressions.iter().position(|(e, _)| *e == operand) {
                                Some(index) => index,
                                None => {
                                    expressions.push((operand, String::new()));
                                    expressions.len() - 1
                                },
                            }
                        },
                    }
                },
            };
            orders.push((index, order.direction));
        }

        let labels: Vec<String> = expressions[..visible].iter().map(|(_, label)| label.clone()).collect();
        let hidden = expressions.len() > visible;
        node = Node::Projection { source: Box::new(node), expressions };
        if !orders.is_empty() {
            node = Node::Order { source: Box::new(node), orders };
        }
        if hidden {
            node = Node::Projection {
                source: Box::new(node),
                expressions: labels.into_iter().enumerate().map(|(i, l)| (Operand::Column(i), l)).collect(),
            };
        }
        if select.distinct {
            node = Node::Distinct { source: Box::new(node) };
        }
        if let Some(offset) = select.offset {
            node = Node::Offset { source: Box::new(node), offset };
        }
        if let Some(limit) = select.limit {
            node = Node::Limit { source: Box::new(node), limit };
        }
        Ok(node)
    }

    /// Builds an aggregation node, returning it with the scope of its
    /// output: the grouping columns followed by the aggregate values.
    fn build_aggregation(&self, select: &ast::Select, source: Node, scope: &Scope) -> Result<(Node, Scope)> {
        let mut grouped = Scope { tables: scope.tables.clone(), ..Scope::default() };

        let mut group_by = vec![];
        for expr in &select.group_by {
            if expr.contains_aggregate() {
                return Err(Error::Validation(format!("Cannot group by aggregate {}", expr)));
            }
            let operand = self.build_operand(expr, scope)?;
            grouped.columns.push(match (&operand, expr) {
                (Operand::Column(i), ast::Expression::Field(..)) => scope.columns[*i].clone(),
                _ => (None, expr.to_string()),
            });
            group_by.push(operand);
        }

        let mut calls: Vec<ast::Expression> = vec![];
        let mut collect = |expr: &ast::Expression| {
            expr.walk(&mut |e| {
                if let ast::Expression::Function(name, _) = e {
                    if ast::AGGREGATES.contains(&name.as_str()) && !calls.contains(e) {
                        calls.push(e.clone());
                    }
                }
            })
        };
        for item in &select.projection {
            if let ast::SelectItem::Expression { expr, .. } = item {
                collect(expr);
            }
        }
        if let Some(having) = &select.having {
            collect(having);
        }
        for order in &select.order_by {
            collect(&order.expr);
        }

        let mut aggregates = vec![];
        for call in &calls {
            let (name, args) = match call {
                ast::Expression::Function(name, args) => (name, args),
                _ => continue,
            };
            let aggregate = Aggregate::from_function(name, args)?
                .ok_or_else(|| Error::Internal(format!("Unknown aggregate {}", name)))?;
            let operand = match aggregate {
                Aggregate::CountAll => Operand::Constant(Value::Integer(1)),
                _ if args[0].contains_aggregate() => {
                    return Err(Error::Validation(format!("Nested aggregate in {}", call)))
                },
                _ => self.build_operand(&args[0], scope)?,
            };
            grouped.aggregates.insert(call.to_string(), grouped.columns.len());
            grouped.columns.push((None, call.to_string()));
            aggregates.push((aggregate, operand));
        }

        Ok((Node::Aggregation { source: Box::new(source), group_by, aggregates }, grouped))
    }

    fn build_filter(&self, expr: Option<&ast::Expression>, scope: &Scope) -> Result<Option<Predicate>> {
        expr.map(|e| self.build_predicate(e, scope)).transpose()
    }

    fn build_predicate(&self, expr: &ast::Expression, scope: &Scope) -> Result<Predicate> {
        Predicate::build(expr, self.params, &|e: &ast::Expression| scope.resolve(e))
    }

    fn build_operand(&self, expr: &ast::Expression, scope: &Scope) -> Result<Operand> {
        Operand::build(expr, self.params, &|e: &ast::Expression| scope.resolve(e))
    }

    /// Builds and evaluates a constant expression.
    fn evaluate_constant(&self, expr: &ast::Expression) -> Result<Value> {
        let operand = Operand::build(expr, self.params, &|e: &ast::Expression| {
            Err(Error::Validation(format!("Expression {} must be constant", e)))
        })?;
        Ok(operand.evaluate(&[]).clone())
    }
}

/// Manages names available to expressions and maps them onto tuple positions.
#[derive(Clone, Debug, Default)]
struct Scope {
    /// Column labels, qualified by table name or alias when known.
    columns: Vec<(Option<String>, String)>,
    /// Visible tables, by query name (i.e. alias or actual name).
    tables: HashSet<String>,
    /// Aggregate calls by their rendered text, after aggregation.
    aggregates: HashMap<String, usize>,
}

impl Scope {
    /// Creates a scope for a table.
    fn from_table(table: &Table, alias: Option<&str>) -> Result<Self> {
        let name = alias.unwrap_or(&table.name).to_string();
        Ok(Self {
            columns: table.columns.iter().map(|c| (Some(name.clone()), c.name.clone())).collect(),
            tables: HashSet::from([name]),
            aggregates: HashMap::new(),
        })
    }

    /// Merges another scope into this one, appending its columns.
    fn merge(&mut self, other: Scope) -> Result<()> {
        for table in &other.tables {
            if self.tables.contains(table) {
                return Err(Error::Validation(format!("Duplicate table name {}", table)));
            }
        }
        self.tables.extend(other.tables);
        self.columns.extend(other.columns);
        Ok(())
    }

    /// Resolves a field or aggregate reference to a tuple position.
    fn resolve(&self, expr: &ast::Expression) -> Result<usize> {
        match expr {
            ast::Expression::Field(Some(relation), name) => {
                if !self.tables.contains(relation) {
                    return Err(Error::TableNotFound(relation.clone()));
                }
                self.columns
                    .iter()
                    .position(|(r, n)| r.as_deref() == Some(relation.as_str()) && n == name)
                    .ok_or_else(|| Error::ColumnNotFound(format!("{}.{}", relation, name)))
            },
            ast::Expression::Field(None, name) => {
                let mut matches = self.columns.iter().enumerate().filter(|(_, (_, n))| n == name);
                match (matches.next(), matches.next()) {
                    (Some((i, _)), None) => Ok(i),
                    (Some(_), Some(_)) => Err(Error::Validation(format!("Ambiguous column name {}", name))),
                    (None, _) => Err(Error::ColumnNotFound(name.clone())),
                }
            },
            ast::Expression::Function(name, _) if ast::AGGREGATES.contains(&name.as_str()) => {
                self.aggregates.get(&expr.to_string()).copied().ok_or_else(|| {
                    Error::Validation(format!("Aggregate {} is not allowed here", expr))
                })
            },
            ast::Expression::Function(name, _) => Err(Error::Unsupported(format!("function {}", name))),
            expr => Err(Error::Internal(format!("Cannot resolve {}", expr))),
        }
    }
}
