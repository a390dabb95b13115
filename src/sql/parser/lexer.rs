use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

// A lexer token
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Number(String),
    String(String),
    Identifier(String),
    Keyword(Keyword),
    Symbol(Symbol),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Token::Number(n) => n,
            Token::String(s) => s,
            Token::Identifier(s) => s,
            Token::Keyword(k) => k.to_str(),
            Token::Symbol(s) => s.to_str(),
        })
    }
}

impl From<Keyword> for Token {
    fn from(keyword: Keyword) -> Self {
        Self::Keyword(keyword)
    }
}

impl From<Symbol> for Token {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

/// Lexer keywords. Type names, conflict-resolution words and the like are
/// left as identifiers so they stay usable as column names.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Keyword {
    Add,
    All,
    Alter,
    And,
    As,
    Asc,
    Autoincrement,
    Begin,
    Between,
    By,
    Column,
    Commit,
    Create,
    Cross,
    Default,
    Delete,
    Desc,
    Distinct,
    Drop,
    Exists,
    False,
    From,
    Grant,
    Group,
    Having,
    If,
    In,
    Index,
    Inner,
    Insert,
    Into,
    Is,
    Join,
    Key,
    Left,
    Like,
    Limit,
    Not,
    Null,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Primary,
    Privileges,
    References,
    Rename,
    Revoke,
    Right,
    Rollback,
    Select,
    Set,
    Table,
    Temp,
    Temporary,
    To,
    Transaction,
    Trigger,
    True,
    Unique,
    Update,
    Values,
    View,
    Where,
}

impl Keyword {
    pub fn from_str(ident: &str) -> Option<Self> {
        Some(match ident.to_uppercase().as_ref() {
            "ADD" => Self::Add,
            "ALL" => Self::All,
            "ALTER" => Self::Alter,
            "AND" => Self::And,
            "AS" => Self::As,
            "ASC" => Self::Asc,
            "AUTOINCREMENT" => Self::Autoincrement,
            "BEGIN" => Self::Begin,
            "BETWEEN" => Self::Between,
            "BY" => Self::By,
            "COLUMN" => Self::Column,
            "COMMIT" => Self::Commit,
            "CREATE" => Self::Create,
            "CROSS" => Self::Cross,
            "DEFAULT" => Self::Default,
            "DELETE" => Self::Delete,
            "DESC" => Self::Desc,
            "DISTINCT" => Self::Distinct,
            "DROP" => Self::Drop,
            "EXISTS" => Self::Exists,
            "FALSE" => Self::False,
            "FROM" => Self::From,
            "GRANT" => Self::Grant,
            "GROUP" => Self::Group,
            "HAVING" => Self::Having,
            "IF" => Self::If,
            "IN" => Self::In,
            "INDEX" => Self::Index,
            "INNER" => Self::Inner,
            "INSERT" => Self::Insert,
            "INTO" => Self::Into,
            "IS" => Self::Is,
            "JOIN" => Self::Join,
            "KEY" => Self::Key,
            "LEFT" => Self::Left,
            "LIKE" => Self::Like,
            "LIMIT" => Self::Limit,
            "NOT" => Self::Not,
            "NULL" => Self::Null,
            "OFFSET" => Self::Offset,
            "ON" => Self::On,
            "OR" => Self::Or,
            "ORDER" => Self::Order,
            "OUTER" => Self::Outer,
            "PRIMARY" => Self::Primary,
            "PRIVILEGES" => Self::Privileges,
            "REFERENCES" => Self::References,
            "RENAME" => Self::Rename,
            "REVOKE" => Self::Revoke,
            "RIGHT" => Self::Right,
            "ROLLBACK" => Self::Rollback,
            "SELECT" => Self::Select,
            "SET" => Self::Set,
            "TABLE" => Self::Table,
            "TEMP" => Self::Temp,
            "TEMPORARY" => Self::Temporary,
            "TO" => Self::To,
            "TRANSACTION" => Self::Transaction,
            "TRIGGER" => Self::Trigger,
            "TRUE" => Self::True,
            "UNIQUE" => Self::Unique,
            "UPDATE" => Self::Update,
            "VALUES" => Self::Values,
            "VIEW" => Self::View,
            "WHERE" => Self::Where,
            _ => return None,
        })
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::All => "ALL",
            Self::Alter => "ALTER",
            Self::And => "AND",
            Self::As => "AS",
            Self::Asc => "ASC",
            Self::Autoincrement => "AUTOINCREMENT",
            Self::Begin => "BEGIN",
            Self::Between => "BETWEEN",
            Self::By => "BY",
            Self::Column => "COLUMN",
            Self::Commit => "COMMIT",
            Self::Create => "CREATE",
            Self::Cross => "CROSS",
            Self::Default => "DEFAULT",
            Self::Delete => "DELETE",
            Self::Desc => "DESC",
            Self::Distinct => "DISTINCT",
            Self::Drop => "DROP",
            Self::Exists => "EXISTS",
            Self::False => "FALSE",
            Self::From => "FROM",
            Self::Grant => "GRANT",
            Self::Group => "GROUP",
            Self::Having => "HAVING",
            Self::If => "IF",
            Self::In => "IN",
            Self::Index => "INDEX",
            Self::Inner => "INNER",
            Self::Insert => "INSERT",
            Self::Into => "INTO",
            Self::Is => "IS",
            Self::Join => "JOIN",
            Self::Key => "KEY",
            Self::Left => "LEFT",
            Self::Like => "LIKE",
            Self::Limit => "LIMIT",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Offset => "OFFSET",
            Self::On => "ON",
            Self::Or => "OR",
            Self::Order => "ORDER",
            Self::Outer => "OUTER",
            Self::Primary => "PRIMARY",
            Self::Privileges => "PRIVILEGES",
            Self::References => "REFERENCES",
            Self::Rename => "RENAME",
            Self::Revoke => "REVOKE",
            Self::Right => "RIGHT",
            Self::Rollback => "ROLLBACK",
            Self::Select => "SELECT",
            Self::Set => "SET",
            Self::Table => "TABLE",
            Self::Temp => "TEMP",
            Self::Temporary => "TEMPORARY",
            Self::To => "TO",
            Self::Transaction => "TRANSACTION",
            Self::Trigger => "TRIGGER",
            Self::True => "TRUE",
            Self::Unique => "UNIQUE",
            Self::Update => "UPDATE",
            Self::Values => "VALUES",
            Self::View => "VIEW",
            Self::Where => "WHERE",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Lexer symbols
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Symbol {
    Period,
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    LessOrGreaterThan,
    Plus,
    Minus,
    Asterisk,
    Exclamation,
    NotEqual,
    Question,
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
}

impl Symbol {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Period => ".",
            Self::Equal => "=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::LessOrGreaterThan => "<>",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Asterisk => "*",
            Self::Exclamation => "!",
            Self::NotEqual => "!=",
            Self::Question => "?",
            Self::OpenParen => "(",
            Self::CloseParen => ")",
            Self::Comma => ",",
            Self::Semicolon => ";",
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// A lexer that tokenizes an input string as an iterator.
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self.iter.peek().map(|c| Err(Error::Parse(format!("Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer { iter: input.chars().peekable() }
    }

    /// Consumes any whitespace characters and `--` line comments.
    fn consume_whitespace(&mut self) {
        loop {
            self.next_while(|c| c.is_whitespace());
            let mut ahead = self.iter.clone();
            if ahead.next() == Some('-') && ahead.next() == Some('-') {
                self.next_while(|c| c != '\n');
            } else {
                break;
            }
        }
    }

    /// Grabs the next character if it matches the given predicate.
    fn next_if<F>(&mut self, predicate: F) -> Option<char>
    where
        F: Fn(char) -> bool,
    {
        self.iter.peek().filter(|&&c| predicate(c))?;
        self.iter.next()
    }

    /// Grabs the next single-character token if the tokenizer function returns one.
    fn next_if_token<F>(&mut self, tokenizer: F) -> Option<Token>
    where
        F: Fn(char) -> Option<Token>,
    {
        let token = self.iter.peek().and_then(|&c| tokenizer(c))?;
        self.iter.next();
        Some(token)
    }

    /// Grabs the next characters that match the predicate, as a string.
    fn next_while<F>(&mut self, predicate: F) -> Option<String>
    where
        F: Fn(char) -> bool,
    {
        let mut str = String::new();
        while let Some(c) = self.next_if(&predicate) {
            str.push(c);
        }
        Some(str).filter(|s| !s.is_empty())
    }

    /// Scans the input for the next token if any, ignoring leading whitespace.
    fn scan(&mut self) -> Result<Option<Token>> {
        self.consume_whitespace();
        match self.iter.peek() {
            Some('\'') => self.scan_string(),
            Some('"') => self.scan_identifier_quoted('"'),
            Some('`') => self.scan_identifier_quoted('`'),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_word()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans the input for the next ident or keyword token, if any.
    fn scan_word(&mut self) -> Option<Token> {
        let mut name = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            name.push(c);
        }
        Keyword::from_str(&name)
            .map(Token::Keyword)
            .or_else(|| Some(Token::Identifier(name)))
    }

    /// Scans the input for the next quoted ident, if any.
    fn scan_identifier_quoted(&mut self, quote: char) -> Result<Option<Token>> {
        if self.next_if(|c| c == quote).is_none() {
            return Ok(None);
        }
        let mut identifier = String::new();
        loop {
            match self.iter.next() {
                Some(c) if c == quote && self.next_if(|c| c == quote).is_some() => identifier.push(quote),
                Some(c) if c == quote => break,
                Some(c) => identifier.push(c),
                None => return Err(Error::Parse("Unexpected end of quoted identifier".into())),
            }
        }
        Ok(Some(Token::Identifier(identifier)))
    }

    /// Scans the input for the next number token, if any.
    fn scan_number(&mut self) -> Option<Token> {
        let mut number = self.next_while(|c| c.is_ascii_digit())?;
        if let Some('.') = self.next_if(|c| c == '.') {
            number.push('.');
            if let Some(fraction) = self.next_while(|c| c.is_ascii_digit()) {
                number.push_str(&fraction);
            }
        }
        if let Some(exp) = self.next_if(|c| c == 'e' || c == 'E') {
            number.push(exp);
            if let Some(sign) = self.next_if(|c| c == '+' || c == '-') {
                number.push(sign);
            }
            number.push_str(&self.next_while(|c| c.is_ascii_digit())?);
        }
        Some(Token::Number(number))
    }

    /// Scans the input for the next string literal, if any.
    fn scan_string(&mut self) -> Result<Option<Token>> {
        if self.next_if(|c| c == '\'').is_none() {
            return Ok(None);
        }
        let mut str = String::new();
        loop {
            match self.iter.next() {
                Some('\'') if self.next_if(|c| c == '\'').is_some() => str.push('\''),
                Some('\'') => break,
                Some(c) => str.push(c),
                None => return Err(Error::Parse("Unexpected end of string literal".into())),
            }
        }
        Ok(Some(Token::String(str)))
    }

    /// Scans the input for the next symbol token, if any, and handle any multi-symbol tokens.
    fn scan_symbol(&mut self) -> Option<Token> {
        self.next_if_token(|c| match c {
            '.' => Some(Token::Symbol(Symbol::Period)),
            '=' => Some(Token::Symbol(Symbol::Equal)),
            '>' => Some(Token::Symbol(Symbol::GreaterThan)),
            '<' => Some(Token::Symbol(Symbol::LessThan)),
            '+' => Some(Token::Symbol(Symbol::Plus)),
            '-' => Some(Token::Symbol(Symbol::Minus)),
            '*' => Some(Token::Symbol(Symbol::Asterisk)),
            '!' => Some(Token::Symbol(Symbol::Exclamation)),
            '?' => Some(Token::Symbol(Symbol::Question)),
            '(' => Some(Token::Symbol(Symbol::OpenParen)),
            ')' => Some(Token::Symbol(Symbol::CloseParen)),
            ',' => Some(Token::Symbol(Symbol::Comma)),
            ';' => Some(Token::Symbol(Symbol::Semicolon)),
            _ => None,
        })
        .map(|token| match token {
            Token::Symbol(Symbol::Exclamation) if self.next_if(|c| c == '=').is_some() => {
                Token::Symbol(Symbol::NotEqual)
            },
            Token::Symbol(Symbol::Equal) => {
                self.next_if(|c| c == '=');
                token
            },
            Token::Symbol(Symbol::GreaterThan) if self.next_if(|c| c == '=').is_some() => {
                Token::Symbol(Symbol::GreaterThanOrEqual)
            },
            Token::Symbol(Symbol::LessThan) if self.next_if(|c| c == '=').is_some() => {
                Token::Symbol(Symbol::LessThanOrEqual)
            },
            Token::Symbol(Symbol::LessThan) if self.next_if(|c| c == '>').is_some() => {
                Token::Symbol(Symbol::LessOrGreaterThan)
            },
            _ => token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Result<Vec<Token>> {
        Lexer::new(input).collect()
    }

    #[test]
    fn literals_and_symbols() -> Result<()> {
        assert_eq!(
            lex("SELECT name FROM users WHERE age >= 2.5 AND x <> ?")?,
            vec![
                Keyword::Select.into(),
                Token::Identifier("name".into()),
                Keyword::From.into(),
                Token::Identifier("users".into()),
                Keyword::Where.into(),
                Token::Identifier("age".into()),
                Symbol::GreaterThanOrEqual.into(),
                Token::Number("2.5".into()),
                Keyword::And.into(),
                Token::Identifier("x".into()),
                Symbol::LessOrGreaterThan.into(),
                Symbol::Question.into(),
            ]
        );
        Ok(())
    }

    #[test]
    fn strings_keep_sql_inside_them() -> Result<()> {
        assert_eq!(
            lex("'it''s''); DROP TABLE x; --'")?,
            vec![Token::String("it's'); DROP TABLE x; --".into())]
        );
        Ok(())
    }

    #[test]
    fn comments_and_quoted_identifiers() -> Result<()> {
        assert_eq!(
            lex("-- leading comment\n\"select\" `a b` -- trailing")?,
            vec![Token::Identifier("select".into()), Token::Identifier("a b".into())]
        );
        Ok(())
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(lex("'abc"), Err(Error::Parse("Unexpected end of string literal".into())));
    }
}
