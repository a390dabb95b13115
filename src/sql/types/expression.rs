use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use super::Value;
use crate::error::{Error, Result};
use crate::sql::parser::{ast, Parser};

/// A scalar operand of a predicate: either a column of the tuple being
/// tested, or a constant bound at compile time from a literal or parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Column(usize),
    Constant(Value),
}

impl Operand {
    /// Builds an operand from an expression. Fields and aggregate calls are
    /// resolved to tuple positions by the given resolver.
    pub fn build<R>(expr: &ast::Expression, params: &[Value], resolve: &R) -> Result<Self>
    where
        R: Fn(&ast::Expression) -> Result<usize>,
    {
        Ok(match expr {
            ast::Expression::Literal(literal) => Self::Constant(literal_value(literal)),
            ast::Expression::Parameter(index) => Self::Constant(
                params
                    .get(*index)
                    .cloned()
                    .ok_or(Error::InvalidParameterCount { expected: index + 1, actual: params.len() })?,
            ),
            ast::Expression::Field(..) | ast::Expression::Function(..) => Self::Column(resolve(expr)?),
            ast::Expression::Wildcard | ast::Expression::Operation(_) => {
                return Err(Error::Validation(format!("Expected a column or a value, found {}", expr)))
            },
        })
    }

    pub fn evaluate<'a>(&'a self, tuple: &'a [Value]) -> &'a Value {
        match self {
            Self::Column(index) => tuple.get(*index).unwrap_or(&Value::Null),
            Self::Constant(value) => value,
        }
    }
}

/// Converts a literal to a value. Booleans are stored as integers.
pub fn literal_value(literal: &ast::Literal) -> Value {
    match literal {
        ast::Literal::Null => Value::Null,
        ast::Literal::Boolean(b) => Value::Integer(*b as i64),
        ast::Literal::Integer(i) => Value::Integer(*i),
        ast::Literal::Float(f) => Value::Real(*f),
        ast::Literal::String(s) => Value::Text(s.clone()),
    }
}

/// Comparison operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CompareOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::NotEqual => ordering != Ordering::Equal,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterThanOrEqual => ordering != Ordering::Less,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// A compiled boolean test over a tuple. Predicates are interpreted by
/// walking the tree; evaluation uses three-valued logic where comparisons
/// involving NULL are unknown, and a tuple passes only if the result is true.
#[derive(Clone, Debug)]
pub enum Predicate {
    Constant(Option<bool>),
    /// A bare column or value used as a condition.
    Truthy(Operand),
    Compare(Operand, CompareOp, Operand),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Like(Operand, Regex),
    In(Operand, Vec<Operand>),
    Between(Operand, Operand, Operand),
    IsNull(Operand),
}

impl Predicate {
    /// Compiles predicate text, e.g. a WHERE clause body, against an ordered
    /// list of column names. Placeholders bind to `params` in order of
    /// occurrence. Unknown columns fail compilation.
    pub fn compile(text: &str, params: &[Value], columns: &[&str]) -> Result<Self> {
        let expr = Parser::new(text).parse_predicate()?;
        Self::build(&expr, params, &|expr: &ast::Expression| match expr {
            ast::Expression::Field(relation, name) => relation
                .as_ref()
                .and_then(|r| columns.iter().position(|c| *c == format!("{}.{}", r, name)))
                .or_else(|| columns.iter().position(|c| *c == name.as_str()))
                .ok_or_else(|| Error::ColumnNotFound(expr.to_string())),
            _ => Err(Error::Unsupported(format!("function {} in a predicate", expr))),
        })
    }

    /// Builds a predicate from an expression tree.
    pub fn build<R>(expr: &ast::Expression, params: &[Value], resolve: &R) -> Result<Self>
    where
        R: Fn(&ast::Expression) -> Result<usize>,
    {
        use ast::Operation as Op;
        let operand = |e: &ast::Expression| Operand::build(e, params, resolve);
        let compare = |lhs: &ast::Expression, op: CompareOp, rhs: &ast::Expression| -> Result<Self> {
            Ok(Self::Compare(operand(lhs)?, op, operand(rhs)?))
        };

        Ok(match expr {
            ast::Expression::Literal(literal) => Self::Constant(truth(&literal_value(literal))),
            ast::Expression::Parameter(_) | ast::Expression::Field(..) | ast::Expression::Function(..) => {
                match operand(expr)? {
                    Operand::Constant(value) => Self::Constant(truth(&value)),
                    column => Self::Truthy(column),
                }
            },
            ast::Expression::Wildcard => {
                return Err(Error::Validation("* is not valid in a predicate".into()))
            },
            ast::Expression::Operation(op) => match op {
                Op::And(lhs, rhs) => Self::And(
                    Box::new(Self::build(lhs, params, resolve)?),
                    Box::new(Self::build(rhs, params, resolve)?),
                ),
                Op::Or(lhs, rhs) => Self::Or(
                    Box::new(Self::build(lhs, params, resolve)?),
                    Box::new(Self::build(rhs, params, resolve)?),
                ),
                Op::Not(expr) => Self::Not(Box::new(Self::build(expr, params, resolve)?)),
                Op::Equal(lhs, rhs) => compare(lhs, CompareOp::Equal, rhs)?,
                Op::NotEqual(lhs, rhs) => compare(lhs, CompareOp::NotEqual, rhs)?,
                Op::GreaterThan(lhs, rhs) => compare(lhs, CompareOp::GreaterThan, rhs)?,
                Op::GreaterThanOrEqual(lhs, rhs) => compare(lhs, CompareOp::GreaterThanOrEqual, rhs)?,
                Op::LessThan(lhs, rhs) => compare(lhs, CompareOp::LessThan, rhs)?,
                Op::LessThanOrEqual(lhs, rhs) => compare(lhs, CompareOp::LessThanOrEqual, rhs)?,
                Op::IsNull(expr) => Self::IsNull(operand(expr)?),
                Op::In(expr, list) => {
                    Self::In(operand(expr)?, list.iter().map(|e| operand(e)).collect::<Result<_>>()?)
                },
                Op::Between(expr, low, high) => Self::Between(operand(expr)?, operand(low)?, operand(high)?),
                Op::Like(expr, pattern) => match operand(pattern)? {
                    Operand::Constant(Value::Null) => Self::Constant(None),
                    Operand::Constant(pattern) => Self::Like(operand(expr)?, like_regex(&pattern.to_string())?),
                    Operand::Column(_) => {
                        return Err(Error::Unsupported(format!("LIKE with a non-constant pattern {}", pattern)))
                    },
                },
            },
        })
    }

    /// Tests a tuple against the predicate.
    pub fn test(&self, tuple: &[Value]) -> bool {
        self.evaluate(tuple) == Some(true)
    }

    /// Evaluates the predicate, returning None when the result is unknown.
    pub fn evaluate(&self, tuple: &[Value]) -> Option<bool> {
        match self {
            Self::Constant(b) => *b,
            Self::Truthy(operand) => truth(operand.evaluate(tuple)),
            Self::Compare(lhs, op, rhs) => {
                lhs.evaluate(tuple).compare(rhs.evaluate(tuple)).map(|ordering| op.holds(ordering))
            },
            Self::And(lhs, rhs) => match (lhs.evaluate(tuple), rhs.evaluate(tuple)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Self::Or(lhs, rhs) => match (lhs.evaluate(tuple), rhs.evaluate(tuple)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Self::Not(predicate) => predicate.evaluate(tuple).map(|b| !b),
            Self::Like(operand, regex) => match operand.evaluate(tuple) {
                Value::Null => None,
                value => Some(regex.is_match(&value.to_string())),
            },
            Self::In(operand, list) => {
                let value = operand.evaluate(tuple);
                if value.is_null() {
                    return None;
                }
                let mut unknown = false;
                for item in list {
                    match value.compare(item.evaluate(tuple)) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {},
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            },
            Self::Between(operand, low, high) => {
                let value = operand.evaluate(tuple);
                let above = value.compare(low.evaluate(tuple)).map(|o| o != Ordering::Less);
                let below = value.compare(high.evaluate(tuple)).map(|o| o != Ordering::Greater);
                match (above, below) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            },
            Self::IsNull(operand) => Some(operand.evaluate(tuple).is_null()),
        }
    }
}

/// SQL truthiness: non-zero numbers are true, NULL is unknown.
fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        value => Some(value.as_number().map_or(false, |n| n != 0.0)),
    }
}

/// Translates a LIKE pattern into an anchored, case-insensitive regex.
/// `%` matches any run of characters and `_` exactly one.
pub fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

/// Aggregate functions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    /// COUNT(*), counting rows
    CountAll,
    /// COUNT(expr), counting non-null values
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    /// Looks up an aggregate function call, checking its arguments.
    pub fn from_function(name: &str, args: &[ast::Expression]) -> Result<Option<Self>> {
        let aggregate = match (name.to_uppercase().as_str(), args) {
            ("COUNT", [ast::Expression::Wildcard]) => Self::CountAll,
            ("COUNT", [_]) => Self::Count,
            ("SUM", [_]) => Self::Sum,
            ("AVG", [_]) => Self::Avg,
            ("MIN", [_]) => Self::Min,
            ("MAX", [_]) => Self::Max,
            (name, _) if ast::AGGREGATES.contains(&name) => {
                return Err(Error::Validation(format!("{} takes exactly one argument", name)))
            },
            _ => return Ok(None),
        };
        Ok(Some(aggregate))
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::CountAll | Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        })
    }
}
