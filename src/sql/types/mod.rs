mod expression;

pub use expression::{Aggregate, CompareOp, Operand, Predicate};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_derive::{Deserialize as DeriveDeserialize, Serialize as DeriveSerialize};

/// A declared column type.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, DeriveSerialize, DeriveDeserialize)]
pub enum DataType {
    Integer,
    Real,
    Text,
    Blob,
}

impl DataType {
    /// Maps a declared SQL type name onto a storage type, using the same
    /// affinity rules for synonyms (VARCHAR, DOUBLE, BOOLEAN, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_uppercase().as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BOOL" | "BOOLEAN" => {
                Self::Integer
            },
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" | "DECIMAL" => Self::Real,
            "TEXT" | "STRING" | "VARCHAR" | "CHAR" | "CLOB" | "DATE" | "DATETIME" => Self::Text,
            "BLOB" => Self::Blob,
            _ => return None,
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        })
    }
}

/// A specific value of a data type
#[derive(Clone, Debug, PartialEq, DeriveSerialize, DeriveDeserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {},
            Value::Integer(i) => i.hash(state),
            // 0.0 and -0.0 are equal, so they must hash alike.
            Value::Real(f) if *f == 0.0 => 0.0f64.to_bits().hash(state),
            Value::Real(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl Value {
    /// Returns the value's datatype, or None for null values.
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(DataType::Integer),
            Self::Real(_) => Some(DataType::Real),
            Self::Text(_) => Some(DataType::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Interprets the value as a number, if it is one or is text that parses as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            Self::Null => None,
        }
    }

    /// Compares two values. Both sides compare as numbers when both are
    /// numeric (or numeric text), otherwise as case-sensitive strings. NULL
    /// is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(a.to_string().cmp(&b.to_string())),
            },
        }
    }

    /// Returns the value's uniqueness key, or None for NULL. Values share a
    /// key exactly when compare() finds them equal, so 7, 7.0 and '7' clash
    /// in a unique column.
    pub fn key(&self) -> Option<Key> {
        let number = |f: f64| match f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            true => Key::Integer(f as i64),
            false => Key::Real(f.to_bits()),
        };
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(Key::Integer(*i)),
            Self::Real(f) => Some(number(*f)),
            Self::Text(s) => match (s.trim().parse::<i64>(), self.as_number()) {
                (Ok(i), _) => Some(Key::Integer(i)),
                (Err(_), Some(f)) => Some(number(f)),
                (Err(_), None) => Some(Key::Text(s.clone())),
            },
        }
    }

    /// Orders values for sorting: NULLs first, then by compare().
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (a, b) => a.compare(b).unwrap_or(Ordering::Equal),
        }
    }

    /// Applies a column's type affinity. Values that cannot be converted
    /// losslessly are stored as given.
    pub fn coerce(self, datatype: DataType) -> Value {
        match (datatype, self) {
            (_, Self::Null) => Self::Null,
            (DataType::Integer, Self::Real(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Self::Integer(f as i64)
            },
            (DataType::Integer, Self::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Self::Integer(i),
                Err(_) => match s.trim().parse::<f64>() {
                    Ok(f) if f.is_finite() => Self::Real(f),
                    _ => Self::Text(s),
                },
            },
            (DataType::Real, Self::Integer(i)) => Self::Real(i as f64),
            (DataType::Real, Self::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Self::Real(f),
                _ => Self::Text(s),
            },
            (DataType::Text, v @ (Self::Integer(_) | Self::Real(_))) => Self::Text(v.to_string()),
            (_, v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A hashable identity for values in unique columns.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Integer(i64),
    Real(u64),
    Text(String),
}

/// A stored row: an ordered mapping of column name to value. Insertion order
/// of the columns is preserved, and setting an existing column keeps its place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    /// Sets a column value, appending the column if it is new.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    /// Renames a column in place.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some((name, _)) = self.fields.iter_mut().find(|(name, _)| name == from) {
            *name = to.to_string();
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(&column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((column, value)) = access.next_entry::<String, Value>()? {
                    row.set(&column, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// A row of values positioned by a plan scope, as produced by executors.
pub type Tuple = Vec<Value>;
