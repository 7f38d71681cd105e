//! Nullable scalar values exchanged with every engine

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Bool(b) => Some(*b as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a command-line literal: `null`, integers and floats get their
    /// own variants, everything else stays text.
    pub fn parse_literal(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("null") {
            return Scalar::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Scalar::Float(f);
            }
        }
        Scalar::Text(raw.to_string())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("NULL"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Bytes(bytes) => {
                f.write_str("0x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_literals() {
        assert_eq!(Scalar::parse_literal("NULL"), Scalar::Null);
        assert_eq!(Scalar::parse_literal("42"), Scalar::Int(42));
        assert_eq!(Scalar::parse_literal("-1.5"), Scalar::Float(-1.5));
        assert_eq!(Scalar::parse_literal("inf"), Scalar::Text("inf".to_string()));
        assert_eq!(Scalar::parse_literal("alice"), Scalar::Text("alice".to_string()));
    }

    #[test]
    fn displays_bytes_as_hex() {
        assert_eq!(Scalar::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
        assert_eq!(Scalar::Null.to_string(), "NULL");
    }

    #[test]
    fn serializes_untagged() {
        let row = vec![Scalar::Int(1), Scalar::Null, Scalar::Text("a".to_string())];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[1,null,"a"]"#);
    }
}
