//! Evaluates WHERE expressions over a single row and checks their truth
//! value. An expression is true if the row passes `WHERE expr`, false if
//! it passes `WHERE NOT (expr)`, and unknown if it passes neither.
use super::{int, rows, setup};
use vaultdb::error::{Error, Result};
use vaultdb::Caller;

const ROW: &[&str] = &[
    "CREATE TABLE t (id INTEGER PRIMARY KEY, a INTEGER, r REAL, s TEXT, n TEXT)",
    "INSERT INTO t VALUES (1, 7, 2.5, 'Hello', NULL)",
];

fn truth(expr: &str) -> Result<Option<bool>> {
    let mut db = setup(ROW)?;
    let passes = |db: &mut vaultdb::Database, filter: String| -> Result<bool> {
        Ok(rows(db, &format!("SELECT COUNT(*) FROM t WHERE {}", filter))? == vec![vec![int(1)]])
    };
    match (passes(&mut db, expr.to_string())?, passes(&mut db, format!("NOT ({})", expr))?) {
        (true, false) => Ok(Some(true)),
        (false, true) => Ok(Some(false)),
        (false, false) => Ok(None),
        (true, true) => panic!("{} is both true and false", expr),
    }
}

macro_rules! test_expr {
    ( $( $name:ident: $expr:expr => $expect:expr, )* ) => {
        $(
            #[test]
            fn $name() -> Result<()> {
                assert_eq!(truth($expr)?, $expect, "{}", $expr);
                Ok(())
            }
        )*
    };
}

macro_rules! test_expr_error {
    ( $( $name:ident: $expr:expr => $expect:pat, )* ) => {
        $(
            #[test]
            fn $name() -> Result<()> {
                let mut db = setup(ROW)?;
                let result = db.query(&format!("SELECT id FROM t WHERE {}", $expr), &[], &Caller::Local);
                assert!(matches!(result, Err($expect)), "unexpected result {:?}", result);
                Ok(())
            }
        )*
    };
}

test_expr! {
    // Comparisons
    eq_int: "a = 7" => Some(true),
    eq_real_int: "r = 2.5 AND a = 7.0" => Some(true),
    ne: "a != 7" => Some(false),
    ne_angle: "a <> 8" => Some(true),
    gt: "a > 6" => Some(true),
    ge: "a >= 7" => Some(true),
    lt: "r < 2" => Some(false),
    le: "r <= 2.5" => Some(true),
    negative: "a > -8" => Some(true),
    text_eq: "s = 'Hello'" => Some(true),
    text_case: "s = 'hello'" => Some(false),
    text_order: "s < 'World'" => Some(true),
    numeric_text: "a = '7'" => Some(true),
    flipped: "7 = a" => Some(true),

    // NULL and three-valued logic
    null_eq: "n = NULL" => None,
    null_ne: "n != 'x'" => None,
    null_is: "n IS NULL" => Some(true),
    null_is_not: "n IS NOT NULL" => Some(false),
    value_is_null: "a IS NULL" => Some(false),
    and_false: "n = 'x' AND a = 0" => Some(false),
    and_unknown: "n = 'x' AND a = 7" => None,
    or_true: "n = 'x' OR a = 7" => Some(true),
    or_unknown: "n = 'x' OR a = 0" => None,
    not_unknown: "NOT n = 'x'" => None,

    // Precedence
    and_before_or: "a = 0 AND a = 7 OR s = 'Hello'" => Some(true),
    parens: "a = 0 AND (a = 7 OR s = 'Hello')" => Some(false),
    not_binds_tight: "NOT a = 0 AND s = 'Hello'" => Some(true),

    // LIKE
    like_prefix: "s LIKE 'He%'" => Some(true),
    like_case: "s LIKE 'hELLO'" => Some(true),
    like_single: "s LIKE 'H_llo'" => Some(true),
    like_short: "s LIKE 'H_lo'" => Some(false),
    like_dot: "s LIKE 'H.llo'" => Some(false),
    like_number: "a LIKE '7'" => Some(true),
    not_like: "s NOT LIKE '%z%'" => Some(true),
    like_null: "n LIKE '%'" => None,

    // IN
    in_hit: "a IN (1, 7)" => Some(true),
    in_miss: "a IN (1, 2)" => Some(false),
    in_text: "s IN ('Hello', 'World')" => Some(true),
    in_null_miss: "a IN (1, NULL)" => None,
    in_null_hit: "a IN (7, NULL)" => Some(true),
    not_in: "a NOT IN (1, 2)" => Some(true),
    in_of_null: "n IN ('x')" => None,

    // BETWEEN
    between: "a BETWEEN 1 AND 7" => Some(true),
    between_outside: "a BETWEEN 8 AND 9" => Some(false),
    between_real: "r BETWEEN 2 AND 3" => Some(true),
    not_between: "a NOT BETWEEN 1 AND 5" => Some(true),
    between_null: "n BETWEEN 'a' AND 'z'" => None,

    // Truthiness
    true_literal: "TRUE" => Some(true),
    false_literal: "FALSE" => Some(false),
    column_truthy: "a" => Some(true),
    null_literal: "NULL" => None,
}

test_expr_error! {
    unknown_column: "b = 1" => Error::ColumnNotFound(_),
    unterminated_string: "s = 'Hello" => Error::Parse(_),
    dangling_operator: "a =" => Error::Parse(_),
    unbalanced_parens: "(a = 1" => Error::Parse(_),
    arithmetic: "a + 1 = 8" => Error::Parse(_),
    unknown_function: "UPPER(s) = 'HELLO'" => Error::Unsupported(_),
    trailing_tokens: "a = 1 1" => Error::Parse(_),
}
