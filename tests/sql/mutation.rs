//! Runs INSERT, UPDATE and DELETE statements against the shared dataset,
//! comparing the statement result and the resulting table contents.
use super::{int, real, rows, setup, text, DATASET, NULL};
use vaultdb::error::{Error, Result};
use vaultdb::sql::execution::ResultSet;
use vaultdb::Caller;

macro_rules! test_mutation {
    ( $( $name:ident: $query:expr => $expect:expr, )* ) => {
        $(
            #[test]
            fn $name() -> Result<()> {
                let mut db = setup(DATASET)?;
                assert_eq!(db.query($query, &[], &Caller::Local), $expect);
                Ok(())
            }
        )*
    };
}

test_mutation! {
    insert_columns: "INSERT INTO users (name, age) VALUES ('Frank', 50)"
        => Ok(ResultSet::Create { count: 1, last_insert_id: Some(6) }),
    insert_multiple: "INSERT INTO users (name) VALUES ('Frank'), ('Grace')"
        => Ok(ResultSet::Create { count: 2, last_insert_id: Some(7) }),
    insert_skips_serial: "INSERT INTO users VALUES ('Frank', 50, 'Rome')"
        => Ok(ResultSet::Create { count: 1, last_insert_id: Some(6) }),
    insert_explicit_id: "INSERT INTO users VALUES (10, 'Frank', 50, 'Rome')"
        => Ok(ResultSet::Create { count: 1, last_insert_id: Some(10) }),
    insert_select: "INSERT INTO orders (user_id, item) SELECT id, name FROM users WHERE age > 26"
        => Ok(ResultSet::Create { count: 2, last_insert_id: Some(7) }),
    insert_duplicate_key: "INSERT INTO users VALUES (1, 'Frank', 50, 'Rome')"
        => Err(Error::Constraint("UNIQUE constraint failed: users.id".into())),
    insert_or_ignore: "INSERT OR IGNORE INTO users VALUES (1, 'Frank', 50, 'Rome')"
        => Ok(ResultSet::Create { count: 0, last_insert_id: None }),
    insert_or_replace: "INSERT OR REPLACE INTO users VALUES (1, 'Frank', 50, 'Rome')"
        => Ok(ResultSet::Create { count: 1, last_insert_id: Some(1) }),
    insert_not_null: "INSERT INTO users (age) VALUES (1)"
        => Err(Error::Constraint("NOT NULL constraint failed: users.name".into())),
    insert_column_count: "INSERT INTO users VALUES (1, 2)"
        => Err(Error::ColumnCountMismatch { columns: 4, values: 2 }),
    insert_list_count: "INSERT INTO users (name, age) VALUES ('Frank')"
        => Err(Error::ColumnCountMismatch { columns: 2, values: 1 }),
    insert_unknown_column: "INSERT INTO users (nope) VALUES (1)"
        => Err(Error::ColumnNotFound("users.nope".into())),
    insert_missing_table: "INSERT INTO missing VALUES (1)"
        => Err(Error::TableNotFound("missing".into())),

    update_where: "UPDATE users SET age = 26 WHERE name = 'Bob'" => Ok(ResultSet::Update { count: 1 }),
    update_all: "UPDATE users SET city = 'Lyon'" => Ok(ResultSet::Update { count: 5 }),
    update_none: "UPDATE users SET city = 'Lyon' WHERE age > 100" => Ok(ResultSet::Update { count: 0 }),
    update_duplicate_key: "UPDATE users SET id = 1 WHERE id = 2"
        => Err(Error::Constraint("UNIQUE constraint failed: users.id".into())),
    update_or_ignore: "UPDATE OR IGNORE users SET id = 1 WHERE id = 2" => Ok(ResultSet::Update { count: 0 }),
    update_or_replace: "UPDATE OR REPLACE users SET id = 1 WHERE id = 2" => Ok(ResultSet::Update { count: 1 }),
    update_not_null: "UPDATE users SET name = NULL WHERE id = 1"
        => Err(Error::Constraint("NOT NULL constraint failed: users.name".into())),
    update_unknown_column: "UPDATE users SET nope = 1" => Err(Error::ColumnNotFound("users.nope".into())),

    delete_where: "DELETE FROM users WHERE name = 'Alice'" => Ok(ResultSet::Delete { count: 1 }),
    delete_all: "DELETE FROM users" => Ok(ResultSet::Delete { count: 5 }),
    delete_null_filter: "DELETE FROM users WHERE age > 26 OR age = NULL" => Ok(ResultSet::Delete { count: 2 }),
}

#[test]
fn insert_defaults_and_affinity() -> Result<()> {
    let mut db = setup(&[
        "CREATE TABLE items (
            id INTEGER PRIMARY KEY,
            label TEXT DEFAULT 'none',
            price REAL,
            qty INTEGER DEFAULT 1
        )",
        "INSERT INTO items (price) VALUES (3)",
        "INSERT INTO items (label, price, qty) VALUES (42, '2.5', '7')",
    ])?;
    assert_eq!(
        rows(&mut db, "SELECT * FROM items")?,
        vec![
            vec![int(1), text("none"), real(3.0), int(1)],
            vec![int(2), text("42"), real(2.5), int(7)],
        ]
    );
    Ok(())
}

#[test]
fn insert_is_atomic() -> Result<()> {
    let mut db = setup(DATASET)?;
    assert!(db.query("INSERT INTO users (name) VALUES ('Frank'), (NULL)", &[], &Caller::Local).is_err());
    assert!(db.query("INSERT INTO users (id, name) VALUES (20, 'Frank'), (20, 'Grace')", &[], &Caller::Local).is_err());
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(5)]]);

    // Ids consumed by a failed statement are not committed.
    db.query("INSERT INTO users (name) VALUES ('Frank')", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT MAX(id) FROM users")?, vec![vec![int(6)]]);
    Ok(())
}

#[test]
fn ids_are_never_reused() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("DELETE FROM users WHERE id >= 4", &[], &Caller::Local)?;
    assert_eq!(
        db.query("INSERT INTO users (name) VALUES ('Frank')", &[], &Caller::Local)?,
        ResultSet::Create { count: 1, last_insert_id: Some(6) }
    );
    db.query("DELETE FROM users", &[], &Caller::Local)?;
    assert_eq!(
        db.query("INSERT INTO users (name) VALUES ('Grace')", &[], &Caller::Local)?,
        ResultSet::Create { count: 1, last_insert_id: Some(7) }
    );
    Ok(())
}

#[test]
fn insert_or_replace_removes_clash() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("INSERT OR REPLACE INTO users VALUES (1, 'Frank', 50, 'Rome')", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT id, name FROM users")?,
        vec![
            vec![int(2), text("Bob")],
            vec![int(3), text("Carol")],
            vec![int(4), text("Dave")],
            vec![int(5), text("Eve")],
            vec![int(1), text("Frank")],
        ]
    );
    Ok(())
}

#[test]
fn update_reads_old_values() -> Result<()> {
    let mut db = setup(&[
        "CREATE TABLE pairs (id INTEGER PRIMARY KEY, a INTEGER, b INTEGER)",
        "INSERT INTO pairs VALUES (1, 10, 20), (2, 30, 40)",
    ])?;
    assert_eq!(
        db.query("UPDATE pairs SET a = b, b = a WHERE id = 1", &[], &Caller::Local)?,
        ResultSet::Update { count: 1 }
    );
    assert_eq!(
        rows(&mut db, "SELECT a, b FROM pairs ORDER BY id")?,
        vec![vec![int(20), int(10)], vec![int(30), int(40)]]
    );
    Ok(())
}

#[test]
fn update_or_replace_removes_clash() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("UPDATE OR REPLACE users SET id = 1 WHERE id = 2", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT id, name FROM users")?,
        vec![
            vec![int(1), text("Bob")],
            vec![int(3), text("Carol")],
            vec![int(4), text("Dave")],
            vec![int(5), text("Eve")],
        ]
    );
    Ok(())
}

#[test]
fn update_is_atomic() -> Result<()> {
    let mut db = setup(DATASET)?;
    assert!(db.query("UPDATE users SET id = 3 WHERE id > 1", &[], &Caller::Local).is_err());
    assert_eq!(rows(&mut db, "SELECT id FROM users")?, vec![vec![int(1)], vec![int(2)], vec![int(3)], vec![int(4)], vec![int(5)]]);
    Ok(())
}

#[test]
fn delete_then_select() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("DELETE FROM users WHERE city = 'Oslo'", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT name, age FROM users")?,
        vec![
            vec![text("Alice"), int(30)],
            vec![text("Carol"), NULL],
            vec![text("Dave"), int(41)],
        ]
    );
    Ok(())
}

#[test]
fn transactions() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("BEGIN", &[], &Caller::Local)?;
    db.query("DELETE FROM users", &[], &Caller::Local)?;
    db.query("DROP TABLE orders", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(0)]]);
    db.query("ROLLBACK", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(5)]]);
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM orders")?, vec![vec![int(5)]]);

    db.query("BEGIN", &[], &Caller::Local)?;
    db.query("DELETE FROM users WHERE id = 1", &[], &Caller::Local)?;
    db.query("COMMIT", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(4)]]);
    Ok(())
}

#[test]
fn unique_checks_on_large_tables() -> Result<()> {
    let mut db = setup(&["CREATE TABLE kv (id INTEGER PRIMARY KEY, k TEXT UNIQUE, v INTEGER)"])?;
    for i in 0..2000 {
        db.query("INSERT INTO kv (k, v) VALUES (?, ?)", &[format!("k{}", i).into(), i.into()], &Caller::Local)?;
    }
    assert_eq!(db.query("UPDATE kv SET v = 0", &[], &Caller::Local)?, ResultSet::Update { count: 2000 });
    assert_eq!(
        db.query("INSERT INTO kv (k) VALUES ('k1999')", &[], &Caller::Local),
        Err(Error::Constraint("UNIQUE constraint failed: kv.k".into()))
    );
    assert_eq!(
        db.query("UPDATE kv SET k = 'k5' WHERE id = 1000", &[], &Caller::Local),
        Err(Error::Constraint("UNIQUE constraint failed: kv.k".into()))
    );
    assert_eq!(
        db.query("INSERT OR REPLACE INTO kv (k, v) VALUES ('k0', 5), ('k0', 6)", &[], &Caller::Local)?,
        ResultSet::Create { count: 1, last_insert_id: Some(2002) }
    );
    assert_eq!(rows(&mut db, "SELECT id, v FROM kv WHERE k = 'k0'")?, vec![vec![int(2002), int(6)]]);
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM kv")?, vec![vec![int(2000)]]);
    assert_eq!(db.query("DELETE FROM kv", &[], &Caller::Local)?, ResultSet::Delete { count: 2000 });
    Ok(())
}

#[test]
fn unique_values_compare_as_numbers() -> Result<()> {
    let mut db = setup(&["CREATE TABLE codes (id INTEGER PRIMARY KEY, code TEXT UNIQUE)"])?;
    db.query("INSERT INTO codes (code) VALUES (7), ('x')", &[], &Caller::Local)?;
    for code in ["'7.0'", "' 7'", "7"] {
        assert_eq!(
            db.query(&format!("INSERT INTO codes (code) VALUES ({})", code), &[], &Caller::Local),
            Err(Error::Constraint("UNIQUE constraint failed: codes.code".into())),
            "{}",
            code
        );
    }
    db.query("INSERT INTO codes (code) VALUES ('X'), (7.5)", &[], &Caller::Local)?;
    // A value freed by one statement can be taken by the next.
    db.query("UPDATE codes SET code = 'y' WHERE code = 'x'", &[], &Caller::Local)?;
    db.query("UPDATE codes SET code = 'x' WHERE code = 'X'", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT code FROM codes ORDER BY id")?, vec![
        vec![text("7")],
        vec![text("y")],
        vec![text("x")],
        vec![text("7.5")],
    ]);
    Ok(())
}
