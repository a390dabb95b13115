pub mod ast;
mod lexer;
mod validate;

use lazy_static::lazy_static;
use regex::Regex;

pub use lexer::{Keyword, Lexer, Symbol, Token};
pub use validate::{validate, Validation};

use self::ast::StatementType;
use crate::access::Permission;
use crate::error::{Error, Result};
use crate::sql::types::DataType;

/// Row cap injected by `optimize` into unbounded SELECTs.
pub const DEFAULT_SELECT_LIMIT: u64 = 1000;

/// Statement keyword sets, tested in order when classifying a statement.
const DML: [Keyword; 4] = [Keyword::Select, Keyword::Insert, Keyword::Update, Keyword::Delete];
const DDL: [Keyword; 3] = [Keyword::Create, Keyword::Drop, Keyword::Alter];
const DCL: [Keyword; 2] = [Keyword::Grant, Keyword::Revoke];
const TCL: [Keyword; 3] = [Keyword::Begin, Keyword::Commit, Keyword::Rollback];

/// A parsed statement along with its diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedStatement {
    pub sql: String,
    pub statement: ast::Statement,
    /// Number of `?` placeholders in the statement.
    pub parameters: usize,
    pub validation: Validation,
}

impl ParsedStatement {
    pub fn statement_type(&self) -> StatementType {
        self.statement.statement_type()
    }
}

/// Parses and validates a single SQL statement.
pub fn parse(sql: &str) -> Result<ParsedStatement> {
    let mut parser = Parser::new(sql);
    let statement = parser.parse()?;
    let validation = validate(&statement);
    Ok(ParsedStatement { sql: sql.trim().to_string(), statement, parameters: parser.parameters, validation })
}

/// Classifies a statement by its leading keyword, without parsing the rest.
pub fn classify(sql: &str) -> Result<StatementType> {
    match Lexer::new(sql).next().transpose()? {
        Some(Token::Keyword(keyword)) => statement_type(keyword)
            .ok_or_else(|| Error::UnknownStatementType(keyword.to_string())),
        Some(token) => Err(Error::UnknownStatementType(token.to_string())),
        None => Err(Error::Parse("Unexpected end of input".into())),
    }
}

fn statement_type(keyword: Keyword) -> Option<StatementType> {
    [&DML[..], &DDL[..], &DCL[..], &TCL[..]]
        .iter()
        .flat_map(|set| set.iter())
        .find(|k| **k == keyword)
        .map(|k| match k {
            Keyword::Select => StatementType::Select,
            Keyword::Insert => StatementType::Insert,
            Keyword::Update => StatementType::Update,
            Keyword::Delete => StatementType::Delete,
            Keyword::Create => StatementType::Create,
            Keyword::Drop => StatementType::Drop,
            Keyword::Alter => StatementType::Alter,
            Keyword::Grant => StatementType::Grant,
            Keyword::Revoke => StatementType::Revoke,
            Keyword::Begin => StatementType::Begin,
            Keyword::Commit => StatementType::Commit,
            _ => StatementType::Rollback,
        })
}

/// Bounds the result size of a SELECT without a LIMIT by injecting one.
/// Other statements, and queries that already have a LIMIT, are returned
/// unchanged.
pub fn optimize(sql: &str) -> Result<String> {
    optimize_with_limit(sql, DEFAULT_SELECT_LIMIT)
}

pub fn optimize_with_limit(sql: &str, limit: u64) -> Result<String> {
    match Parser::new(sql).parse()? {
        ast::Statement::Select(mut select) if select.limit.is_none() => {
            select.limit = Some(limit);
            Ok(select.to_string())
        },
        _ => Ok(sql.trim().to_string()),
    }
}

/// An SQL parser
pub struct Parser<'a> {
    lexer: std::iter::Peekable<Lexer<'a>>,
    parameters: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given string input.
    pub fn new(query: &str) -> Parser {
        Parser { lexer: Lexer::new(query).peekable(), parameters: 0 }
    }

    /// Parses an SQL query.
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let statement = self.parse_statement()?;
        self.next_if_token(Token::Symbol(Symbol::Semicolon));
        self.next_expect(None)?;
        Ok(statement)
    }

    /// Parses a standalone expression, such as a WHERE predicate. Placeholders
    /// are numbered from 0.
    pub fn parse_predicate(&mut self) -> Result<ast::Expression> {
        let expr = self.parse_expression(0)?;
        self.next_expect(None)?;
        Ok(expr)
    }

    /// Grabs the next lexer token, or throws an error if none is found.
    fn next(&mut self) -> Result<Token> {
        self.lexer.next().unwrap_or_else(|| Err(Error::Parse("Unexpected end of input".into())))
    }

    /// Grabs the next lexer token, and returns it if it was expected or otherwise throws an error.
    fn next_expect(&mut self, expected: Option<Token>) -> Result<Option<Token>> {
        match expected {
            Some(token) => {
                let actual = self.next()?;
                if actual == token {
                    Ok(Some(token))
                } else {
                    Err(Error::Parse(format!("Expected token {}, found {}", token, actual)))
                }
            },
            None => {
                if let Some(token) = self.peek()? {
                    Err(Error::Parse(format!("Expected end of tokens, found {}", token)))
                } else {
                    Ok(None)
                }
            },
        }
    }

    /// Grabs the next identifier, or errors if not found.
    fn next_identifier(&mut self) -> Result<String> {
        match self.next()? {
            Token::Identifier(identifier) => Ok(identifier),
            token => Err(Error::Parse(format!("Expected identifier, found {}", token))),
        }
    }

    /// Grabs the next lexer token if it satisfies the predicate function.
    fn next_if<F>(&mut self, predicate: F) -> Option<Token>
    where
        F: Fn(&Token) -> bool,
    {
        self.peek()
            .unwrap_or(None)
            .filter(|token| predicate(token))
            .and_then(|_| self.next().ok())
    }

    /// Grabs the next operator if it satisfies the type and precedence.
    fn next_if_operator<O: Operator>(&mut self, min_prec: u8) -> Result<Option<O>> {
        if let Some(op) = self
            .peek()
            .unwrap_or(None)
            .and_then(|token| O::from(&token))
            .filter(|op| op.precedence() >= min_prec)
        {
            self.next()?;
            Ok(Some(op.augment(self)?))
        } else {
            Ok(None)
        }
    }

    /// Grabs the next lexer token if it is a given token.
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| *t == token)
    }

    /// Grabs the next identifier if there is one.
    fn next_if_identifier(&mut self) -> Option<String> {
        match self.next_if(|t| matches!(t, Token::Identifier(_))) {
            Some(Token::Identifier(identifier)) => Some(identifier),
            _ => None,
        }
    }

    /// Peeks the next lexer token if any, but converts it from
    /// Option<Result<Token>> to Result<Option<Token>> which is
    /// more convenient to work with (the Iterator trait requires Option<T>).
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Parses a comma-separated list using the given item parser.
    fn parse_list<T, F>(&mut self, mut item: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let mut items = vec![item(self)?];
        while self.next_if_token(Symbol::Comma.into()).is_some() {
            items.push(item(self)?);
        }
        Ok(items)
    }

    /// Parses a parenthesized, comma-separated identifier list. An empty
    /// list is accepted here and rejected during validation.
    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        self.next_expect(Some(Symbol::OpenParen.into()))?;
        if self.next_if_token(Symbol::CloseParen.into()).is_some() {
            return Ok(vec![]);
        }
        let identifiers = self.parse_list(|p| p.next_identifier())?;
        self.next_expect(Some(Symbol::CloseParen.into()))?;
        Ok(identifiers)
    }

    /// Parses an SQL statement, dispatching on the keyword set its leading
    /// token belongs to.
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        let keyword = match self.peek()? {
            Some(Token::Keyword(keyword)) => keyword,
            Some(token) => return Err(Error::UnknownStatementType(token.to_string())),
            None => return Err(Error::Parse("Unexpected end of input".into())),
        };
        match statement_type(keyword).map(|t| t.category()) {
            Some(ast::Category::Dml) => match keyword {
                Keyword::Select => Ok(ast::Statement::Select(self.parse_select()?)),
                Keyword::Insert => self.parse_statement_insert(),
                Keyword::Update => self.parse_statement_update(),
                _ => self.parse_statement_delete(),
            },
            Some(ast::Category::Ddl) => self.parse_ddl(),
            Some(ast::Category::Dcl) => self.parse_dcl(),
            Some(ast::Category::Tcl) => self.parse_transaction(),
            None => Err(Error::UnknownStatementType(keyword.to_string())),
        }
    }

    /// Parses a transaction statement.
    fn parse_transaction(&mut self) -> Result<ast::Statement> {
        let statement = match self.next()? {
            Token::Keyword(Keyword::Begin) => {
                if let Some(mode) = self.next_if_identifier() {
                    match mode.to_uppercase().as_str() {
                        "DEFERRED" | "IMMEDIATE" | "EXCLUSIVE" => {},
                        _ => return Err(Error::Parse(format!("Unexpected token {}", mode))),
                    }
                }
                ast::Statement::Begin
            },
            Token::Keyword(Keyword::Commit) => ast::Statement::Commit,
            Token::Keyword(Keyword::Rollback) => ast::Statement::Rollback,
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        self.next_if_token(Keyword::Transaction.into());
        Ok(statement)
    }

    /// Parses a DDL statement.
    fn parse_ddl(&mut self) -> Result<ast::Statement> {
        match self.next()? {
            Token::Keyword(Keyword::Create) => self.parse_ddl_create(),
            Token::Keyword(Keyword::Drop) => self.parse_ddl_drop(),
            Token::Keyword(Keyword::Alter) => self.parse_ddl_alter(),
            token => Err(Error::Parse(format!("Unexpected token {}", token))),
        }
    }

    /// Parses `IF NOT EXISTS`, if present.
    fn parse_if_not_exists(&mut self) -> Result<bool> {
        if self.next_if_token(Keyword::If.into()).is_none() {
            return Ok(false);
        }
        self.next_expect(Some(Keyword::Not.into()))?;
        self.next_expect(Some(Keyword::Exists.into()))?;
        Ok(true)
    }

    /// Parses a CREATE statement. The CREATE prefix has already been consumed.
    fn parse_ddl_create(&mut self) -> Result<ast::Statement> {
        let temporary = self
            .next_if(|t| *t == Keyword::Temp.into() || *t == Keyword::Temporary.into())
            .is_some();
        let unique = self.next_if_token(Keyword::Unique.into()).is_some();
        let kind = match self.next()? {
            Token::Keyword(Keyword::Table) => ast::ObjectKind::Table,
            Token::Keyword(Keyword::Index) => ast::ObjectKind::Index,
            Token::Keyword(Keyword::View) => ast::ObjectKind::View,
            Token::Keyword(Keyword::Trigger) => ast::ObjectKind::Trigger,
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        if unique && kind != ast::ObjectKind::Index {
            return Err(Error::Parse(format!("UNIQUE is not valid for CREATE {}", kind)));
        }
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.next_identifier()?;

        let object = match kind {
            ast::ObjectKind::Table => ast::CreateObject::Table(self.parse_ddl_create_table()?),
            ast::ObjectKind::Index => {
                self.next_expect(Some(Keyword::On.into()))?;
                let table = self.next_identifier()?;
                let columns = self.parse_identifier_list()?;
                ast::CreateObject::Index { table, columns, unique }
            },
            ast::ObjectKind::View => {
                self.next_expect(Some(Keyword::As.into()))?;
                ast::CreateObject::View(Box::new(self.parse_select()?))
            },
            ast::ObjectKind::Trigger => {
                let mut body = vec![];
                while let Some(token) = self.lexer.next().transpose()? {
                    body.push(token.to_string());
                }
                ast::CreateObject::Trigger(body.join(" "))
            },
        };
        Ok(ast::Statement::Create(ast::Create { name, if_not_exists, temporary, object }))
    }

    /// Parses the column list of a CREATE TABLE statement, including
    /// table-level PRIMARY KEY (col) and UNIQUE (col) constraints.
    fn parse_ddl_create_table(&mut self) -> Result<Vec<ast::Column>> {
        self.next_expect(Some(Symbol::OpenParen.into()))?;
        let mut columns: Vec<ast::Column> = vec![];
        if self.next_if_token(Symbol::CloseParen.into()).is_some() {
            return Ok(columns);
        }
        loop {
            match self.peek()? {
                Some(Token::Keyword(Keyword::Primary)) => {
                    self.next()?;
                    self.next_expect(Some(Keyword::Key.into()))?;
                    let keys = self.parse_identifier_list()?;
                    if keys.len() != 1 {
                        return Err(Error::Parse("Composite primary keys are not supported".into()));
                    }
                    let column = columns
                        .iter_mut()
                        .find(|c| c.name == keys[0])
                        .ok_or_else(|| Error::ColumnNotFound(keys[0].clone()))?;
                    column.primary_key = true;
                },
                Some(Token::Keyword(Keyword::Unique)) => {
                    self.next()?;
                    for key in self.parse_identifier_list()? {
                        let column = columns
                            .iter_mut()
                            .find(|c| c.name == key)
                            .ok_or_else(|| Error::ColumnNotFound(key.clone()))?;
                        column.unique = true;
                    }
                },
                _ => columns.push(self.parse_ddl_columnspec()?),
            }
            if self.next_if_token(Symbol::Comma.into()).is_none() {
                break;
            }
        }
        self.next_expect(Some(Symbol::CloseParen.into()))?;
        Ok(columns)
    }

    /// Parses a column specification
    fn parse_ddl_columnspec(&mut self) -> Result<ast::Column> {
        let name = self.next_identifier()?;
        let datatype = match self.next_if_identifier() {
            Some(type_name) => {
                let datatype = DataType::from_name(&type_name)
                    .ok_or_else(|| Error::Parse(format!("Unknown column type {}", type_name)))?;
                // Length and precision modifiers, e.g. VARCHAR(255), are accepted and ignored.
                if self.next_if_token(Symbol::OpenParen.into()).is_some() {
                    self.parse_list(|p| match p.next()? {
                        Token::Number(n) => Ok(n),
                        token => Err(Error::Parse(format!("Expected number, found {}", token))),
                    })?;
                    self.next_expect(Some(Symbol::CloseParen.into()))?;
                }
                datatype
            },
            None => DataType::Text,
        };
        let mut column = ast::Column::new(&name, datatype);
        while let Some(Token::Keyword(keyword)) = self.next_if(|t| matches!(t, Token::Keyword(_))) {
            match keyword {
                Keyword::Primary => {
                    self.next_expect(Some(Keyword::Key.into()))?;
                    self.next_if(|t| *t == Keyword::Asc.into() || *t == Keyword::Desc.into());
                    column.primary_key = true;
                },
                Keyword::Autoincrement => column.autoincrement = true,
                Keyword::Null => {
                    if let Some(false) = column.nullable {
                        return Err(Error::Value(format!(
                            "Column {} can't be both not nullable and nullable",
                            column.name
                        )));
                    }
                    column.nullable = Some(true)
                },
                Keyword::Not => {
                    self.next_expect(Some(Keyword::Null.into()))?;
                    if let Some(true) = column.nullable {
                        return Err(Error::Value(format!(
                            "Column {} can't be both not nullable and nullable",
                            column.name
                        )));
                    }
                    column.nullable = Some(false)
                },
                // Signed atoms only, so a trailing NOT NULL isn't read as NOT IN/LIKE.
                Keyword::Default => column.default = Some(self.parse_expression(PREC_SIGN - 2)?),
                Keyword::Unique => column.unique = true,
                Keyword::References => {
                    let table = self.next_identifier()?;
                    let mut reference = ast::ForeignKey { table, column: None };
                    if self.next_if_token(Symbol::OpenParen.into()).is_some() {
                        reference.column = Some(self.next_identifier()?);
                        self.next_expect(Some(Symbol::CloseParen.into()))?;
                    }
                    column.references = Some(reference);
                },
                keyword => return Err(Error::Parse(format!("Unexpected keyword {}", keyword))),
            }
        }
        Ok(column)
    }

    /// Parses a DROP statement. The DROP prefix has already been consumed.
    fn parse_ddl_drop(&mut self) -> Result<ast::Statement> {
        let kind = match self.next()? {
            Token::Keyword(Keyword::Table) => ast::ObjectKind::Table,
            Token::Keyword(Keyword::Index) => ast::ObjectKind::Index,
            Token::Keyword(Keyword::View) => ast::ObjectKind::View,
            Token::Keyword(Keyword::Trigger) => ast::ObjectKind::Trigger,
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        let if_exists = match self.next_if_token(Keyword::If.into()) {
            Some(_) => {
                self.next_expect(Some(Keyword::Exists.into()))?;
                true
            },
            None => false,
        };
        Ok(ast::Statement::Drop(ast::Drop { kind, name: self.next_identifier()?, if_exists }))
    }

    /// Parses an ALTER TABLE statement. The ALTER prefix has already been consumed.
    fn parse_ddl_alter(&mut self) -> Result<ast::Statement> {
        self.next_expect(Some(Keyword::Table.into()))?;
        let table = self.next_identifier()?;
        let action = match self.next()? {
            Token::Keyword(Keyword::Add) => {
                self.next_if_token(Keyword::Column.into());
                ast::AlterAction::AddColumn(self.parse_ddl_columnspec()?)
            },
            Token::Keyword(Keyword::Rename) => {
                if self.next_if_token(Keyword::To.into()).is_some() {
                    ast::AlterAction::RenameTable(self.next_identifier()?)
                } else {
                    self.next_if_token(Keyword::Column.into());
                    let from = self.next_identifier()?;
                    self.next_expect(Some(Keyword::To.into()))?;
                    ast::AlterAction::RenameColumn { from, to: self.next_identifier()? }
                }
            },
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        Ok(ast::Statement::Alter(ast::Alter { table, action }))
    }

    /// Parses a GRANT or REVOKE statement.
    fn parse_dcl(&mut self) -> Result<ast::Statement> {
        let grant = match self.next()? {
            Token::Keyword(Keyword::Grant) => true,
            Token::Keyword(Keyword::Revoke) => false,
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        let privileges = if self.next_if_token(Keyword::All.into()).is_some() {
            self.next_if_token(Keyword::Privileges.into());
            ast::Privileges::All
        } else {
            ast::Privileges::List(self.parse_list(|p| match p.next()? {
                Token::Keyword(keyword) => Permission::from_keyword(keyword)
                    .ok_or_else(|| Error::Parse(format!("Unknown privilege {}", keyword))),
                token => Err(Error::Parse(format!("Unknown privilege {}", token))),
            })?)
        };
        let on = match self.next_if_token(Keyword::On.into()) {
            Some(_) => {
                self.next_if_token(Keyword::Table.into());
                Some(self.next_identifier()?)
            },
            None => None,
        };
        if grant {
            self.next_expect(Some(Keyword::To.into()))?;
            Ok(ast::Statement::Grant(ast::Grant { privileges, on, grantee: self.next_identifier()? }))
        } else {
            self.next_expect(Some(Keyword::From.into()))?;
            Ok(ast::Statement::Revoke(ast::Revoke { privileges, on, grantee: self.next_identifier()? }))
        }
    }

    /// Parses an optional `OR <resolution>` conflict clause.
    fn parse_conflict(&mut self) -> Result<Option<ast::Conflict>> {
        if self.next_if_token(Keyword::Or.into()).is_none() {
            return Ok(None);
        }
        let word = self.next()?.to_string();
        ast::Conflict::from_str(&word)
            .map(Some)
            .ok_or_else(|| Error::Parse(format!("Unknown conflict resolution {}", word)))
    }

    /// Parses an INSERT statement.
    fn parse_statement_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Some(Keyword::Insert.into()))?;
        let conflict = self.parse_conflict()?;
        self.next_expect(Some(Keyword::Into.into()))?;
        let table = self.next_identifier()?;

        let columns = match self.peek()? {
            Some(Token::Symbol(Symbol::OpenParen)) => Some(self.parse_identifier_list()?),
            _ => None,
        };

        let source = match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => ast::InsertSource::Select(Box::new(self.parse_select()?)),
            _ => {
                self.next_expect(Some(Keyword::Values.into()))?;
                ast::InsertSource::Values(self.parse_list(|p| {
                    p.next_expect(Some(Symbol::OpenParen.into()))?;
                    let expressions = p.parse_list(|p| p.parse_expression(0))?;
                    p.next_expect(Some(Symbol::CloseParen.into()))?;
                    Ok(expressions)
                })?)
            },
        };

        Ok(ast::Statement::Insert(ast::Insert { conflict, table, columns, source }))
    }

    /// Parses an UPDATE statement.
    fn parse_statement_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(Some(Keyword::Update.into()))?;
        let conflict = self.parse_conflict()?;
        let table = self.next_identifier()?;
        self.next_expect(Some(Keyword::Set.into()))?;

        let mut set: Vec<(String, ast::Expression)> = vec![];
        loop {
            let column = self.next_identifier()?;
            self.next_expect(Some(Token::Symbol(Symbol::Equal)))?;
            let expression = self.parse_expression(0)?;
            if set.iter().any(|(c, _)| *c == column) {
                return Err(Error::Value(format!("Duplicate column {}", column)));
            }
            set.push((column, expression));
            if self.next_if_token(Token::Symbol(Symbol::Comma)).is_none() {
                break;
            }
        }

        Ok(ast::Statement::Update(ast::Update { conflict, table, set, r#where: self.parse_clause_where()? }))
    }

    /// Parses a DELETE statement.
    fn parse_statement_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(Some(Keyword::Delete.into()))?;
        self.next_expect(Some(Keyword::From.into()))?;
        let table = self.next_identifier()?;
        Ok(ast::Statement::Delete(ast::Delete { table, r#where: self.parse_clause_where()? }))
    }

    /// Parses a SELECT query.
    fn parse_select(&mut self) -> Result<ast::Select> {
        self.next_expect(Some(Keyword::Select.into()))?;
        let distinct = self.next_if_token(Keyword::Distinct.into()).is_some();
        if !distinct {
            self.next_if_token(Keyword::All.into());
        }
        let projection = self.parse_list(|p| p.parse_select_item())?;

        let mut select = ast::Select { distinct, projection, ..Default::default() };
        if self.next_if_token(Keyword::From.into()).is_some() {
            select.from = Some(self.parse_table_ref()?);
            select.joins = self.parse_clause_joins()?;
        }
        select.r#where = self.parse_clause_where()?;
        if self.next_if_token(Keyword::Group.into()).is_some() {
            self.next_expect(Some(Keyword::By.into()))?;
            select.group_by = self.parse_list(|p| p.parse_expression(0))?;
        }
        if self.next_if_token(Keyword::Having.into()).is_some() {
            select.having = Some(self.parse_expression(0)?);
        }
        if self.next_if_token(Keyword::Order.into()).is_some() {
            self.next_expect(Some(Keyword::By.into()))?;
            select.order_by = self.parse_list(|p| {
                let expr = p.parse_expression(0)?;
                let direction = match p.next_if(|t| *t == Keyword::Asc.into() || *t == Keyword::Desc.into()) {
                    Some(Token::Keyword(Keyword::Desc)) => ast::Direction::Descending,
                    _ => ast::Direction::Ascending,
                };
                Ok(ast::OrderBy { expr, direction })
            })?;
        }
        if self.next_if_token(Keyword::Limit.into()).is_some() {
            let first = self.parse_count()?;
            if self.next_if_token(Symbol::Comma.into()).is_some() {
                select.offset = Some(first);
                select.limit = Some(self.parse_count()?);
            } else {
                select.limit = Some(first);
            }
        }
        if self.next_if_token(Keyword::Offset.into()).is_some() {
            select.offset = Some(self.parse_count()?);
        }
        Ok(select)
    }

    /// Parses a non-negative integer, as used by LIMIT and OFFSET.
    fn parse_count(&mut self) -> Result<u64> {
        match self.next()? {
            Token::Number(n) => Ok(n.parse::<u64>()?),
            token => Err(Error::Parse(format!("Expected number, found {}", token))),
        }
    }

    /// Parses a projection item, with an optional alias.
    fn parse_select_item(&mut self) -> Result<ast::SelectItem> {
        if self.next_if_token(Symbol::Asterisk.into()).is_some() {
            return Ok(ast::SelectItem::Wildcard);
        }
        match self.parse_expression(0)? {
            ast::Expression::Field(Some(relation), field) if field == "*" => {
                Ok(ast::SelectItem::QualifiedWildcard(relation))
            },
            expr => Ok(ast::SelectItem::Expression { expr, alias: self.parse_alias()? }),
        }
    }

    /// Parses an optional `[AS] alias`.
    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.next_if_token(Keyword::As.into()).is_some() {
            return Ok(Some(self.next_identifier()?));
        }
        Ok(self.next_if_identifier())
    }

    /// Parses a table reference
    fn parse_table_ref(&mut self) -> Result<ast::TableRef> {
        let name = self.next_identifier()?;
        Ok(ast::TableRef { name, alias: self.parse_alias()? })
    }

    /// Parses any JOIN clauses following the FROM table.
    fn parse_clause_joins(&mut self) -> Result<Vec<ast::Join>> {
        let mut joins = vec![];
        loop {
            let kind = match self.peek()? {
                Some(Token::Symbol(Symbol::Comma)) => ast::JoinKind::Cross,
                Some(Token::Keyword(Keyword::Join)) | Some(Token::Keyword(Keyword::Inner)) => ast::JoinKind::Inner,
                Some(Token::Keyword(Keyword::Left)) => ast::JoinKind::Left,
                Some(Token::Keyword(Keyword::Right)) => ast::JoinKind::Right,
                Some(Token::Keyword(Keyword::Cross)) => ast::JoinKind::Cross,
                _ => return Ok(joins),
            };
            match self.next()? {
                Token::Symbol(Symbol::Comma) | Token::Keyword(Keyword::Join) => {},
                _ => {
                    if matches!(kind, ast::JoinKind::Left | ast::JoinKind::Right) {
                        self.next_if_token(Keyword::Outer.into());
                    }
                    self.next_expect(Some(Keyword::Join.into()))?;
                },
            }
            let table = self.parse_table_ref()?;
            let on = match kind {
                ast::JoinKind::Cross => None,
                _ => {
                    self.next_expect(Some(Keyword::On.into()))?;
                    Some(self.parse_expression(0)?)
                },
            };
            joins.push(ast::Join { kind, table, on });
        }
    }

    /// Parses a WHERE clause.
    fn parse_clause_where(&mut self) -> Result<Option<ast::Expression>> {
        if self.next_if_token(Keyword::Where.into()).is_none() {
            return Ok(None);
        }
        Ok(Some(self.parse_expression(0)?))
    }

    /// Parses an expression consisting of at least one atom operated on by any
    /// number of operators, using the precedence climbing algorithm.
    fn parse_expression(&mut self, min_prec: u8) -> Result<ast::Expression> {
        let mut lhs = if let Some(prefix) = self.next_if_operator::<PrefixOperator>(min_prec)? {
            match (&prefix, self.peek()?) {
                // A negative literal is parsed whole, so that i64::MIN fits.
                (PrefixOperator::Minus, Some(Token::Number(n))) => {
                    self.next()?;
                    parse_number(&format!("-{}", n))?
                },
                _ => prefix.build(self.parse_expression(prefix.precedence() + prefix.associativity())?)?,
            }
        } else {
            self.parse_expression_atom()?
        };
        while let Some(postfix) = self.next_if_operator::<PostfixOperator>(min_prec)? {
            lhs = postfix.build(lhs)?
        }
        while let Some(infix) = self.next_if_operator::<InfixOperator>(min_prec)? {
            lhs = infix.build(lhs, self.parse_expression(infix.precedence() + infix.associativity())?)
        }
        Ok(lhs)
    }

    /// Parses an expression atom
    fn parse_expression_atom(&mut self) -> Result<ast::Expression> {
        Ok(match self.next()? {
            Token::Identifier(id) => {
                if self.next_if_token(Token::Symbol(Symbol::OpenParen)).is_some() {
                    let name = id.to_uppercase();
                    let mut args = vec![];
                    while self.next_if_token(Token::Symbol(Symbol::CloseParen)).is_none() {
                        if !args.is_empty() {
                            self.next_expect(Some(Token::Symbol(Symbol::Comma)))?;
                        }
                        if name == "COUNT" && self.next_if_token(Token::Symbol(Symbol::Asterisk)).is_some() {
                            args.push(ast::Expression::Wildcard);
                        } else {
                            args.push(self.parse_expression(0)?);
                        }
                    }
                    ast::Expression::Function(name, args)
                } else {
                    let mut relation = None;
                    let mut field = id;
                    if self.next_if_token(Token::Symbol(Symbol::Period)).is_some() {
                        relation = Some(field);
                        field = match self.next_if_token(Symbol::Asterisk.into()) {
                            Some(_) => "*".to_string(),
                            None => self.next_identifier()?,
                        };
                    }
                    ast::Expression::Field(relation, field)
                }
            },
            Token::Number(n) => parse_number(&n)?,
            Token::Symbol(Symbol::OpenParen) => {
                let expr = self.parse_expression(0)?;
                self.next_expect(Some(Token::Symbol(Symbol::CloseParen)))?;
                expr
            },
            Token::Symbol(Symbol::Question) => {
                self.parameters += 1;
                ast::Expression::Parameter(self.parameters - 1)
            },
            Token::String(s) => ast::Literal::String(s).into(),
            Token::Keyword(Keyword::False) => ast::Literal::Boolean(false).into(),
            Token::Keyword(Keyword::Null) => ast::Literal::Null.into(),
            Token::Keyword(Keyword::True) => ast::Literal::Boolean(true).into(),
            t => return Err(Error::Parse(format!("Expected expression atom, found {}", t))),
        })
    }
}

/// Parses a number literal. Integers must fit in an i64 and reals must be
/// finite.
fn parse_number(n: &str) -> Result<ast::Expression> {
    if n.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) {
        return Ok(ast::Literal::Integer(n.parse()?).into());
    }
    match n.parse::<f64>()? {
        f if f.is_finite() => Ok(ast::Literal::Float(f).into()),
        _ => Err(Error::Parse(format!("Number {} is out of range", n))),
    }
}

/// An operator trait, to help with parsing of operators
trait Operator: Sized {
    /// Looks up the corresponding operator for a token, if one exists
    fn from(token: &Token) -> Option<Self>;
    /// Augments an operator by allowing it to parse any modifiers.
    fn augment(self, parser: &mut Parser) -> Result<Self>;
    /// Returns the operator's associativity
    fn associativity(&self) -> u8;
    /// Returns the operator's precedence
    fn precedence(&self) -> u8;
}

const ASSOC_LEFT: u8 = 1;
const ASSOC_RIGHT: u8 = 0;

/// Precedence of comparisons, also used for the operands of BETWEEN and LIKE.
const PREC_COMPARE: u8 = 5;
/// Precedence of unary sign operators, which only apply to number literals.
const PREC_SIGN: u8 = 9;

/// Prefix operators
enum PrefixOperator {
    Minus,
    Not,
    Plus,
}

impl PrefixOperator {
    fn build(&self, rhs: ast::Expression) -> Result<ast::Expression> {
        use ast::{Expression::Literal as L, Literal};
        Ok(match (self, rhs) {
            (PrefixOperator::Not, rhs) => ast::Operation::Not(Box::new(rhs)).into(),
            (PrefixOperator::Minus, L(Literal::Integer(i))) => match i.checked_neg() {
                Some(i) => Literal::Integer(i).into(),
                None => return Err(Error::Parse(format!("Number -({}) is out of range", i))),
            },
            (PrefixOperator::Minus, L(Literal::Float(f))) => Literal::Float(-f).into(),
            (PrefixOperator::Plus, rhs @ L(Literal::Integer(_) | Literal::Float(_))) => rhs,
            (_, rhs) => return Err(Error::Parse(format!("Expected number after sign, found {}", rhs))),
        })
    }
}

impl Operator for PrefixOperator {
    fn from(token: &Token) -> Option<Self> {
        match token {
            Token::Keyword(Keyword::Not) => Some(Self::Not),
            Token::Symbol(Symbol::Minus) => Some(Self::Minus),
            Token::Symbol(Symbol::Plus) => Some(Self::Plus),
            _ => None,
        }
    }

    fn augment(self, _parser: &mut Parser) -> Result<Self> {
        Ok(self)
    }

    fn associativity(&self) -> u8 {
        ASSOC_RIGHT
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Not => 3,
            Self::Minus | Self::Plus => PREC_SIGN,
        }
    }
}

enum InfixOperator {
    And,
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotEqual,
    Or,
}

impl InfixOperator {
    fn build(&self, lhs: ast::Expression, rhs: ast::Expression) -> ast::Expression {
        let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
        match self {
            Self::And => ast::Operation::And(lhs, rhs),
            Self::Equal => ast::Operation::Equal(lhs, rhs),
            Self::GreaterThan => ast::Operation::GreaterThan(lhs, rhs),
            Self::GreaterThanOrEqual => ast::Operation::GreaterThanOrEqual(lhs, rhs),
            Self::LessThan => ast::Operation::LessThan(lhs, rhs),
            Self::LessThanOrEqual => ast::Operation::LessThanOrEqual(lhs, rhs),
            Self::Like => ast::Operation::Like(lhs, rhs),
            Self::NotEqual => ast::Operation::NotEqual(lhs, rhs),
            Self::Or => ast::Operation::Or(lhs, rhs),
        }
        .into()
    }
}

impl Operator for InfixOperator {
    fn from(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Keyword(Keyword::And) => Self::And,
            Token::Keyword(Keyword::Like) => Self::Like,
            Token::Keyword(Keyword::Or) => Self::Or,
            Token::Symbol(Symbol::Equal) => Self::Equal,
            Token::Symbol(Symbol::GreaterThan) => Self::GreaterThan,
            Token::Symbol(Symbol::GreaterThanOrEqual) => Self::GreaterThanOrEqual,
            Token::Symbol(Symbol::LessOrGreaterThan) => Self::NotEqual,
            Token::Symbol(Symbol::LessThan) => Self::LessThan,
            Token::Symbol(Symbol::LessThanOrEqual) => Self::LessThanOrEqual,
            Token::Symbol(Symbol::NotEqual) => Self::NotEqual,
            _ => return None,
        })
    }

    fn augment(self, _parser: &mut Parser) -> Result<Self> {
        Ok(self)
    }

    fn associativity(&self) -> u8 {
        ASSOC_LEFT
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal | Self::NotEqual | Self::Like => 4,
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => PREC_COMPARE,
        }
    }
}

/// Postfix operators. IN, BETWEEN and NOT LIKE parse their operands while
/// being augmented.
enum PostfixOperator {
    IsNull { not: bool },
    In { not: bool, list: Vec<ast::Expression> },
    Between { not: bool, bounds: Option<(ast::Expression, ast::Expression)> },
    Like { not: bool, pattern: Option<ast::Expression> },
    /// A NOT following an operand, resolved into one of the above.
    Not,
}

impl PostfixOperator {
    fn build(self, lhs: ast::Expression) -> Result<ast::Expression> {
        let lhs = Box::new(lhs);
        let (not, expr): (bool, ast::Expression) = match self {
            Self::IsNull { not } => (not, ast::Operation::IsNull(lhs).into()),
            Self::In { not, list } => (not, ast::Operation::In(lhs, list).into()),
            Self::Between { not, bounds: Some((low, high)) } => {
                (not, ast::Operation::Between(lhs, Box::new(low), Box::new(high)).into())
            },
            Self::Like { not, pattern: Some(pattern) } => {
                (not, ast::Operation::Like(lhs, Box::new(pattern)).into())
            },
            _ => return Err(Error::Internal("Postfix operator was not augmented".into())),
        };
        Ok(match not {
            true => ast::Operation::Not(Box::new(expr)).into(),
            false => expr,
        })
    }
}

impl Operator for PostfixOperator {
    fn from(token: &Token) -> Option<Self> {
        match token {
            Token::Keyword(Keyword::Is) => Some(Self::IsNull { not: false }),
            Token::Keyword(Keyword::In) => Some(Self::In { not: false, list: vec![] }),
            Token::Keyword(Keyword::Between) => Some(Self::Between { not: false, bounds: None }),
            Token::Keyword(Keyword::Not) => Some(Self::Not),
            _ => None,
        }
    }

    fn augment(self, parser: &mut Parser) -> Result<Self> {
        Ok(match self {
            Self::IsNull { .. } => {
                let not = parser.next_if_token(Keyword::Not.into()).is_some();
                parser.next_expect(Some(Keyword::Null.into()))?;
                Self::IsNull { not }
            },
            Self::In { not, .. } => {
                parser.next_expect(Some(Symbol::OpenParen.into()))?;
                let list = parser.parse_list(|p| p.parse_expression(0))?;
                parser.next_expect(Some(Symbol::CloseParen.into()))?;
                Self::In { not, list }
            },
            Self::Between { not, .. } => {
                let low = parser.parse_expression(PREC_COMPARE)?;
                parser.next_expect(Some(Keyword::And.into()))?;
                let high = parser.parse_expression(PREC_COMPARE)?;
                Self::Between { not, bounds: Some((low, high)) }
            },
            Self::Like { not, .. } => Self::Like { not, pattern: Some(parser.parse_expression(PREC_COMPARE)?) },
            Self::Not => match parser.next()? {
                Token::Keyword(Keyword::In) => Self::In { not: true, list: vec![] }.augment(parser)?,
                Token::Keyword(Keyword::Between) => Self::Between { not: true, bounds: None }.augment(parser)?,
                Token::Keyword(Keyword::Like) => Self::Like { not: true, pattern: None }.augment(parser)?,
                token => return Err(Error::Parse(format!("Unexpected token {} after NOT", token))),
            },
        })
    }

    fn associativity(&self) -> u8 {
        ASSOC_LEFT
    }

    fn precedence(&self) -> u8 {
        6
    }
}

// Formats an identifier by quoting it as appropriate
pub(super) fn format_ident(ident: &str) -> String {
    lazy_static! {
        static ref RE_IDENT: Regex = Regex::new(r#"^[A-Za-z_][\w_]*$"#).unwrap();
    }

    if RE_IDENT.is_match(ident) && Keyword::from_str(ident).is_none() {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('\"', "\"\""))
    }
}
