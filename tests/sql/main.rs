mod access;
mod expression;
mod mutation;
mod query;
mod schema;

use vaultdb::error::Result;
use vaultdb::sql::execution::ResultSet;
use vaultdb::sql::types::{Tuple, Value};
use vaultdb::{Caller, Database};

/// Sets up an in-memory database with an initial dataset.
fn setup(queries: &[&str]) -> Result<Database> {
    let mut db = Database::in_memory();
    for query in queries {
        db.query(query, &[], &Caller::Local)?;
    }
    Ok(db)
}

/// Runs a query as the local caller and returns its rows.
fn rows(db: &mut Database, query: &str) -> Result<Vec<Tuple>> {
    match db.query(query, &[], &Caller::Local)? {
        ResultSet::Query { rows, .. } => Ok(rows),
        result => panic!("Expected query result, got {:?}", result),
    }
}

fn int(i: i64) -> Value {
    Value::Integer(i)
}

fn real(f: f64) -> Value {
    Value::Real(f)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

const NULL: Value = Value::Null;

/// The users and orders dataset shared by query and mutation tests.
const DATASET: &[&str] = &[
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER,
        city VARCHAR(32)
    )",
    "INSERT INTO users (name, age, city) VALUES
        ('Alice', 30, 'Paris'),
        ('Bob', 25, 'Oslo'),
        ('Carol', NULL, 'Paris'),
        ('Dave', 41, 'Rome'),
        ('Eve', 25, 'Oslo')",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        user_id INTEGER REFERENCES users(id),
        item TEXT,
        amount REAL
    )",
    "INSERT INTO orders VALUES
        (1, 1, 'book', 12.5),
        (2, 1, 'pen', 2.0),
        (3, 2, 'lamp', 30),
        (4, 4, 'book', 15.0),
        (5, 9, 'ghost', 1.0)",
];
