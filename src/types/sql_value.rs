use std::fmt;

/// Represents a SQL value in a driver-agnostic way, both as a bound
/// parameter and as a column value read back from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    /// Wide integer as delivered by drivers with big number support.
    BigInt(i128),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value. Text is parsed, so `"1"` and `1` agree.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int32(v) => Some(i64::from(*v)),
            SqlValue::Int64(v) => Some(*v),
            SqlValue::BigInt(v) => i64::try_from(*v).ok(),
            SqlValue::Bool(v) => Some(i64::from(*v)),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering, `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Int32(v) => write!(f, "{v}"),
            SqlValue::Int64(v) => write!(f, "{v}"),
            SqlValue::BigInt(v) => write!(f, "{v}"),
            SqlValue::Double(v) => write!(f, "{v}"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int64(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => SqlValue::Int64(v),
            Err(_) => SqlValue::BigInt(i128::from(value)),
        }
    }
}

impl From<i128> for SqlValue {
    fn from(value: i128) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}
