//! Runs a SQL script against a vaultDB database. Statements are read from
//! stdin, each terminated by a semicolon, and every result is printed as
//! one JSON line. Lines starting with `!` are commands. The snapshot is
//! flushed when input ends.
//!
//! A failing command is reported like a failing statement, and the script
//! goes on.
//!
//! Usage: vaultdb [--config FILE] [--role ROLE | --anonymous]

use std::io::{BufRead, Write};

use log::info;
use tracing_subscriber::EnvFilter;
use vaultdb::error::{Error, Result};
use vaultdb::sql::parser::{Lexer, Symbol, Token};
use vaultdb::{Caller, Config, Database};

fn main() -> Result<()> {
    let mut file = None;
    let mut caller = Caller::Local;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => file = Some(args.next().ok_or_else(|| Error::Config("--config needs a file".into()))?),
            "--role" => {
                caller = Caller::from(args.next().ok_or_else(|| Error::Config("--role needs a role".into()))?.as_str())
            },
            "--anonymous" => caller = Caller::Anonymous,
            arg => return Err(Error::Config(format!("Unknown argument {}", arg))),
        }
    }

    let config = Config::load(file.as_deref())?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut db = Database::open(config)?;
    info!("Opened database with {} tables", db.list_tables().len());

    let outcome = run(&mut db, &caller, std::io::stdin().lock(), &mut std::io::stdout().lock());
    db.flush()?;
    outcome
}

/// Runs a script, writing one JSON line per statement or command.
fn run(db: &mut Database, caller: &Caller, input: impl BufRead, output: &mut impl Write) -> Result<()> {
    let mut buffer = String::new();
    for line in input.lines() {
        let line = line?;
        if buffer.is_empty() && line.trim().starts_with('!') {
            if let Err(err) = command(db, line.trim(), &mut *output) {
                writeln!(output, "{}", serde_json::json!({ "success": false, "error": err.to_string() }))?;
            }
            continue;
        }
        buffer.push_str(&line);
        buffer.push('\n');
        if is_complete(&buffer) {
            let result = db.execute(buffer.trim(), &[], caller);
            writeln!(output, "{}", serde_json::to_string(&result)?)?;
            buffer.clear();
        }
    }
    if !buffer.trim().is_empty() {
        let result = db.execute(buffer.trim(), &[], caller);
        writeln!(output, "{}", serde_json::to_string(&result)?)?;
    }
    Ok(())
}

/// Whether the input ends with a semicolon outside of any string literal.
/// Input that doesn't lex is treated as complete, so the error surfaces.
fn is_complete(input: &str) -> bool {
    let mut last = None;
    for token in Lexer::new(input) {
        match token {
            Ok(token) => last = Some(token),
            Err(_) => return true,
        }
    }
    last == Some(Token::Symbol(Symbol::Semicolon))
}

fn command(db: &mut Database, input: &str, output: &mut impl Write) -> Result<()> {
    let mut words = input.split_ascii_whitespace();
    match (words.next(), words.next(), words.next(), words.next()) {
        (Some("!tables"), None, ..) => writeln!(output, "{}", serde_json::to_string(&db.list_tables())?)?,
        (Some("!table"), Some(table), None, _) => {
            let schema = db.get_schema(table).ok_or_else(|| Error::TableNotFound(table.to_string()))?;
            writeln!(output, "{}", serde_json::to_string(&schema)?)?
        },
        (Some("!users"), None, ..) => writeln!(output, "{}", serde_json::to_string(&db.users())?)?,
        (Some("!adduser"), Some(username), Some(password), Some(role)) => {
            db.add_user(username, password, role)?;
            writeln!(output, "{}", serde_json::json!({ "success": true, "username": username, "role": role }))?;
        },
        (Some("!flush"), None, ..) => db.flush()?,
        _ => return Err(Error::Parse(format!("Unknown command {}", input))),
    }
    Ok(())
}
