//! Runs DDL statements and checks the resulting schemas and data.
use super::{int, rows, setup, text, DATASET, NULL};
use vaultdb::error::{Error, Result};
use vaultdb::sql::execution::ResultSet;
use vaultdb::sql::schema::Index;
use vaultdb::sql::types::{DataType, Value};
use vaultdb::Caller;

macro_rules! test_schema {
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

test_schema! {
    create_table: "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)"
        => Ok(ResultSet::CreateTable { name: "notes".into(), created: true }),
    create_table_exists: "CREATE TABLE users (id INTEGER PRIMARY KEY)"
        => Err(Error::TableAlreadyExists("users".into())),
    create_table_if_not_exists: "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY)"
        => Ok(ResultSet::CreateTable { name: "users".into(), created: false }),
    create_table_duplicate_column: "CREATE TABLE notes (a TEXT, a TEXT)"
        => Err(Error::Validation("Duplicate column a".into())),
    create_table_two_keys: "CREATE TABLE notes (a INTEGER PRIMARY KEY, b INTEGER PRIMARY KEY)"
        => Err(Error::Validation("Table notes has multiple primary keys".into())),
    create_table_bad_serial: "CREATE TABLE notes (id TEXT PRIMARY KEY AUTOINCREMENT)"
        => Err(Error::Validation("AUTOINCREMENT is only allowed on an INTEGER PRIMARY KEY, not id".into())),
    create_view: "CREATE VIEW adults AS SELECT * FROM users WHERE age >= 18"
        => Err(Error::Unsupported("CREATE VIEW".into())),
    create_temporary: "CREATE TEMPORARY TABLE scratch (id INTEGER PRIMARY KEY)"
        => Ok(ResultSet::CreateTable { name: "scratch".into(), created: true }),

    drop_table: "DROP TABLE orders" => Ok(ResultSet::DropTable { name: "orders".into(), existed: true }),
    drop_table_missing: "DROP TABLE missing" => Err(Error::TableNotFound("missing".into())),
    drop_table_if_exists: "DROP TABLE IF EXISTS missing"
        => Ok(ResultSet::DropTable { name: "missing".into(), existed: false }),
    drop_view: "DROP VIEW adults" => Err(Error::Unsupported("DROP VIEW".into())),

    create_index: "CREATE INDEX users_city ON users (city)"
        => Ok(ResultSet::CreateIndex { name: "users_city".into(), created: true }),
    create_index_missing_table: "CREATE INDEX idx ON missing (a)" => Err(Error::TableNotFound("missing".into())),
    create_index_missing_column: "CREATE INDEX idx ON users (nope)"
        => Err(Error::ColumnNotFound("users.nope".into())),
    create_unique_index_duplicates: "CREATE UNIQUE INDEX users_city ON users (city)"
        => Err(Error::Constraint("UNIQUE constraint failed: users.city".into())),
    drop_index_missing: "DROP INDEX missing" => Err(Error::IndexNotFound("missing".into())),
    drop_index_if_exists: "DROP INDEX IF EXISTS missing"
        => Ok(ResultSet::DropIndex { name: "missing".into(), existed: false }),

    alter_missing_table: "ALTER TABLE missing ADD COLUMN a TEXT" => Err(Error::TableNotFound("missing".into())),
    alter_duplicate_column: "ALTER TABLE users ADD COLUMN name TEXT"
        => Err(Error::Validation("Duplicate column name in table users".into())),
    alter_not_null_without_default: "ALTER TABLE users ADD COLUMN email TEXT NOT NULL"
        => Err(Error::Constraint("NOT NULL constraint failed: users.email".into())),
    alter_rename_to_existing: "ALTER TABLE users RENAME TO orders" => Err(Error::TableAlreadyExists("orders".into())),
}

#[test]
fn create_if_not_exists_twice() -> Result<()> {
    let create = "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT)";
    let mut db = setup(&[create])?;
    let result = db.execute(create, &[], &Caller::Local);
    assert!(result.success, "{:?}", result.error);
    assert_eq!(db.list_tables(), vec!["notes".to_string()]);
    Ok(())
}

#[test]
fn implicit_primary_key() -> Result<()> {
    let mut db = setup(&[])?;
    let result = db.execute("CREATE TABLE notes (body TEXT NOT NULL)", &[], &Caller::Local);
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);

    let schema = db.get_schema("notes").ok_or_else(|| Error::TableNotFound("notes".into()))?;
    let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "body"]);
    assert!(schema.columns[0].is_primary_key);
    assert!(schema.columns[0].is_auto_increment);
    assert_eq!(schema.columns[1].datatype, DataType::Text);
    assert!(!schema.columns[1].is_nullable);

    db.query("INSERT INTO notes (body) VALUES ('a'), ('b')", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT * FROM notes")?, vec![vec![int(1), text("a")], vec![int(2), text("b")]]);
    Ok(())
}

#[test]
fn table_constraints() -> Result<()> {
    let mut db = setup(&["CREATE TABLE tags (
        name VARCHAR(20),
        slug TEXT,
        PRIMARY KEY (name),
        UNIQUE (slug)
    )"])?;
    let schema = db.get_schema("tags").ok_or_else(|| Error::TableNotFound("tags".into()))?;
    assert!(schema.columns[0].is_primary_key);
    assert!(schema.columns[1].is_unique);

    db.query("INSERT INTO tags VALUES ('Rust', 'rust'), ('Go', NULL), ('C', NULL)", &[], &Caller::Local)?;
    assert_eq!(
        db.query("INSERT INTO tags VALUES ('rust-lang', 'rust')", &[], &Caller::Local),
        Err(Error::Constraint("UNIQUE constraint failed: tags.slug".into()))
    );
    Ok(())
}

#[test]
fn foreign_keys_are_metadata() -> Result<()> {
    let mut db = setup(DATASET)?;
    let schema = db.get_schema("orders").ok_or_else(|| Error::TableNotFound("orders".into()))?;
    assert_eq!(schema.columns[1].references.as_deref(), Some("users"));
    // Dangling references are stored as given.
    db.query("INSERT INTO orders (user_id, item) VALUES (99, 'kite')", &[], &Caller::Local)?;
    Ok(())
}

#[test]
fn drop_table_removes_rows() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("DROP TABLE users", &[], &Caller::Local)?;
    assert_eq!(db.list_tables(), vec!["orders".to_string()]);
    db.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[], &Caller::Local)?;
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(0)]]);
    Ok(())
}

#[test]
fn indexes() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("CREATE UNIQUE INDEX users_name ON users (name)", &[], &Caller::Local)?;
    let schema = db.get_schema("users").ok_or_else(|| Error::TableNotFound("users".into()))?;
    assert_eq!(schema.indexes, vec![Index { name: "users_name".into(), columns: vec!["name".into()], unique: true }]);

    assert_eq!(
        db.query("CREATE INDEX users_name ON users (age)", &[], &Caller::Local),
        Err(Error::IndexAlreadyExists("users_name".into()))
    );
    assert_eq!(
        db.query("CREATE INDEX IF NOT EXISTS users_name ON users (age)", &[], &Caller::Local)?,
        ResultSet::CreateIndex { name: "users_name".into(), created: false }
    );

    // Unique indexes are enforced on writes.
    assert_eq!(
        db.query("INSERT INTO users (name) VALUES ('Alice')", &[], &Caller::Local),
        Err(Error::Constraint("UNIQUE constraint failed: users.name".into()))
    );

    assert_eq!(
        db.query("DROP INDEX users_name", &[], &Caller::Local)?,
        ResultSet::DropIndex { name: "users_name".into(), existed: true }
    );
    db.query("INSERT INTO users (name) VALUES ('Alice')", &[], &Caller::Local)?;
    assert!(db.get_schema("users").map_or(false, |t| t.indexes.is_empty()));
    Ok(())
}

#[test]
fn alter_add_column() -> Result<()> {
    let mut db = setup(DATASET)?;
    assert_eq!(
        db.query("ALTER TABLE users ADD COLUMN active INTEGER NOT NULL DEFAULT 1", &[], &Caller::Local)?,
        ResultSet::AlterTable { name: "users".into() }
    );
    db.query("ALTER TABLE users ADD email TEXT", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT name, active, email FROM users WHERE id = 1")?,
        vec![vec![text("Alice"), int(1), NULL]]
    );
    db.query("INSERT INTO users (name, email) VALUES ('Frank', 'f@x.io')", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT active, email FROM users WHERE name = 'Frank'")?,
        vec![vec![int(1), text("f@x.io")]]
    );

    // A NOT NULL column without a default is fine on an empty table.
    db.query("CREATE TABLE empty (id INTEGER PRIMARY KEY)", &[], &Caller::Local)?;
    db.query("ALTER TABLE empty ADD COLUMN code TEXT NOT NULL", &[], &Caller::Local)?;
    assert!(matches!(
        db.query("ALTER TABLE users ADD COLUMN code TEXT UNIQUE", &[], &Caller::Local),
        Err(Error::Unsupported(_))
    ));
    Ok(())
}

#[test]
fn alter_rename() -> Result<()> {
    let mut db = setup(DATASET)?;
    db.query("CREATE INDEX users_city ON users (city)", &[], &Caller::Local)?;
    db.query("ALTER TABLE users RENAME COLUMN city TO town", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT town FROM users WHERE name = 'Dave'")?,
        vec![vec![text("Rome")]]
    );
    assert!(matches!(db.query("SELECT city FROM users", &[], &Caller::Local), Err(Error::ColumnNotFound(_))));
    let schema = db.get_schema("users").ok_or_else(|| Error::TableNotFound("users".into()))?;
    assert_eq!(schema.indexes[0].columns, vec!["town".to_string()]);

    db.query("ALTER TABLE users RENAME TO people", &[], &Caller::Local)?;
    assert_eq!(db.list_tables(), vec!["orders".to_string(), "people".to_string()]);
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM people")?, vec![vec![int(5)]]);
    assert!(matches!(db.query("SELECT * FROM users", &[], &Caller::Local), Err(Error::TableNotFound(_))));
    Ok(())
}

#[test]
fn default_values() -> Result<()> {
    let mut db = setup(&["CREATE TABLE settings (
        id INTEGER PRIMARY KEY,
        theme TEXT DEFAULT 'dark',
        volume REAL DEFAULT 5,
        muted INTEGER DEFAULT FALSE
    )"])?;
    db.query("INSERT INTO settings (id) VALUES (1)", &[], &Caller::Local)?;
    assert_eq!(
        rows(&mut db, "SELECT theme, volume, muted FROM settings")?,
        vec![vec![text("dark"), Value::Real(5.0), int(0)]]
    );
    Ok(())
}
