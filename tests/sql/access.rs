//! Checks that statements are gated by the caller's role before they run.
use super::{int, rows, setup, DATASET};
use vaultdb::access::Permission;
use vaultdb::error::{Error, Result};
use vaultdb::sql::execution::ResultSet;
use vaultdb::Caller;

macro_rules! test_denied {
    ( $( $name:ident: $role:expr, $query:expr => $permission:expr, )* ) => {
        $(
            #[test]
            fn $name() -> Result<()> {
                let mut db = setup(DATASET)?;
                let caller = Caller::from($role);
                assert_eq!(db.query($query, &[], &caller), Err(Error::PermissionDenied($permission)));
                // Nothing changed.
                assert_eq!(db.list_tables(), vec!["orders".to_string(), "users".to_string()]);
                assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(5)]]);
                Ok(())
            }
        )*
    };
}

test_denied! {
    readonly_insert: "readonly", "INSERT INTO users (name) VALUES ('Mallory')" => Permission::Insert,
    readonly_update: "readonly", "UPDATE users SET name = 'Mallory'" => Permission::Update,
    readonly_delete: "readonly", "DELETE FROM users" => Permission::Delete,
    readonly_create: "readonly", "CREATE TABLE evil (id INTEGER PRIMARY KEY)" => Permission::Create,
    readonly_drop: "readonly", "DROP TABLE users" => Permission::Drop,
    readonly_alter: "readonly", "ALTER TABLE users ADD COLUMN x TEXT" => Permission::Alter,
    viewer_delete: "viewer", "DELETE FROM users WHERE id = 1" => Permission::Delete,
    operator_drop: "operator", "DROP TABLE users" => Permission::Drop,
    operator_create: "operator", "CREATE TABLE evil (id INTEGER PRIMARY KEY)" => Permission::Create,
    operator_grant: "operator", "GRANT SELECT ON users TO mallory" => Permission::Grant,
    unknown_role_select: "nobody", "SELECT * FROM users" => Permission::Select,
    missing_table_is_still_denied: "viewer", "DROP TABLE missing" => Permission::Drop,
}

#[test]
fn denial_names_the_verb() -> Result<()> {
    let mut db = setup(DATASET)?;
    let result = db.execute("DELETE FROM users WHERE id = 1", &[], &Caller::from("viewer"));
    assert!(!result.success);
    assert!(result.error.as_deref().map_or(false, |e| e.contains("DELETE")), "{:?}", result.error);
    assert_eq!(result.changes, None);
    Ok(())
}

#[test]
fn readers_can_select() -> Result<()> {
    let mut db = setup(DATASET)?;
    for role in ["readonly", "viewer", "operator", "admin"] {
        let result = db.query("SELECT name FROM users WHERE id = 1", &[], &Caller::from(role))?;
        assert_eq!(result.into_rows()?.len(), 1, "{}", role);
    }
    Ok(())
}

#[test]
fn anonymous_has_no_permissions() -> Result<()> {
    let mut db = setup(DATASET)?;
    assert_eq!(
        db.query("SELECT * FROM users", &[], &Caller::Anonymous),
        Err(Error::PermissionDenied(Permission::Select))
    );
    // Transaction control needs no permission.
    db.query("BEGIN", &[], &Caller::Anonymous)?;
    db.query("ROLLBACK", &[], &Caller::Anonymous)?;
    Ok(())
}

#[test]
fn operator_writes() -> Result<()> {
    let mut db = setup(DATASET)?;
    let operator = Caller::from("operator");
    db.query("INSERT INTO users (name) VALUES ('Frank')", &[], &operator)?;
    db.query("UPDATE users SET age = 20 WHERE name = 'Frank'", &[], &operator)?;
    assert_eq!(db.query("DELETE FROM users WHERE age = 20", &[], &operator)?, ResultSet::Delete { count: 1 });
    Ok(())
}

#[test]
fn admin_manages_schema() -> Result<()> {
    let mut db = setup(DATASET)?;
    let admin = Caller::from("admin");
    db.query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &[], &admin)?;
    db.query("ALTER TABLE notes ADD COLUMN tag TEXT", &[], &admin)?;
    db.query("DROP TABLE notes", &[], &admin)?;
    Ok(())
}

#[test]
fn grant_and_revoke() -> Result<()> {
    let mut db = setup(DATASET)?;
    let admin = Caller::from("admin");
    assert_eq!(
        db.query("GRANT SELECT, INSERT ON users TO mallory", &[], &admin)?,
        ResultSet::Grant { grantee: "mallory".into() }
    );
    let users = db.users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "mallory");
    assert_eq!(users[0].role, "readonly");
    // Granted users have no password until one is set.
    assert_eq!(db.authenticate("mallory", ""), None);

    assert_eq!(
        db.query("GRANT ALL PRIVILEGES ON missing TO mallory", &[], &admin),
        Err(Error::TableNotFound("missing".into()))
    );
    assert_eq!(
        db.query("REVOKE INSERT ON users FROM mallory", &[], &admin)?,
        ResultSet::Revoke { grantee: "mallory".into() }
    );
    // Roles are fixed, so REVOKE changes nothing.
    db.query("REVOKE ALL FROM nobody", &[], &admin)?;
    assert_eq!(db.users().len(), 1);
    assert_eq!(
        db.query("REVOKE SELECT ON users FROM mallory", &[], &Caller::from("viewer")),
        Err(Error::PermissionDenied(Permission::Revoke))
    );
    Ok(())
}

#[test]
fn users_authenticate() -> Result<()> {
    let mut db = setup(&[])?;
    db.add_user("alice", "s3cret", "operator")?;
    assert!(matches!(db.add_user("bob", "pw", "superuser"), Err(Error::Validation(_))));

    let identity = db.authenticate("alice", "s3cret").ok_or_else(|| Error::Value("no identity".into()))?;
    assert_eq!(identity.role, "operator");
    assert_eq!(db.authenticate("alice", "wrong"), None);
    assert_eq!(db.authenticate("bob", "pw"), None);

    // Stored credentials are hashes, never the password.
    let record = &db.access().user_records()["alice"];
    assert!(record.password_hash.as_deref().map_or(false, |h| h.starts_with("$argon2") && !h.contains("s3cret")));

    assert!(db.remove_user("alice"));
    assert!(!db.remove_user("alice"));
    assert_eq!(db.authenticate("alice", "s3cret"), None);
    Ok(())
}

#[test]
fn malformed_writes_are_denied() -> Result<()> {
    let mut db = setup(DATASET)?;
    let reader = Caller::from("readonly");
    for (query, params, permission) in [
        ("INSERT INTO users (name, age) VALUES (?, ?)", vec![], Permission::Insert),
        ("INSERT INTO users (name, age) VALUES ('Mallory')", vec![], Permission::Insert),
        ("INSERT INTO users (name) VALUES (?)", vec![f64::NAN.into()], Permission::Insert),
        ("INSERT INTO users (name VALUES", vec![], Permission::Insert),
        ("UPDATE users SET nope = 1 WHERE id = ?", vec![], Permission::Update),
        ("DELETE FROM users WHERE id = ?", vec![], Permission::Delete),
        ("DELETE FROM users WHERE", vec![], Permission::Delete),
        ("CREATE TABLE evil (a TEXT, a TEXT)", vec![], Permission::Create),
        ("DROP TABLE", vec![], Permission::Drop),
    ] {
        assert_eq!(db.query(query, &params, &reader), Err(Error::PermissionDenied(permission)), "{}", query);
    }
    assert_eq!(rows(&mut db, "SELECT COUNT(*) FROM users")?, vec![vec![int(5)]]);

    // Permitted callers see the underlying error.
    assert_eq!(
        db.query("DELETE FROM users WHERE id = ?", &[], &Caller::from("operator")),
        Err(Error::InvalidParameterCount { expected: 1, actual: 0 })
    );
    Ok(())
}
