use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parsed header value.
///
/// Header lines carry decimal or `0x`-prefixed hex integers, floats, free
/// text, or comma-separated lists of any of those.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<HeaderValue>),
}

impl HeaderValue {
    /// Parse a single header token into the most specific value kind.
    pub fn parse(raw: &str) -> HeaderValue {
        let s = raw.trim();
        if let Some(hex) = s.strip_prefix("0x") {
            if let Ok(v) = i64::from_str_radix(hex, 16) {
                return HeaderValue::Int(v);
            }
        }
        if let Ok(v) = s.parse::<i64>() {
            return HeaderValue::Int(v);
        }
        if let Ok(v) = s.parse::<f64>() {
            return HeaderValue::Float(v);
        }
        HeaderValue::Text(s.to_string())
    }

    /// Parse a header value, splitting comma-separated tokens into a list.
    pub fn parse_value(raw: &str) -> HeaderValue {
        if raw.contains(',') {
            HeaderValue::List(raw.split(',').map(HeaderValue::parse).collect())
        } else {
            HeaderValue::parse(raw)
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            HeaderValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HeaderValue]> {
        match self {
            HeaderValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integer list accessor; a scalar int acts as a one-element list.
    pub fn int_at(&self, index: usize) -> Option<i64> {
        match self {
            HeaderValue::List(items) => items.get(index).and_then(HeaderValue::as_int),
            _ if index == 0 => self.as_int(),
            _ => None,
        }
    }
}

impl std::fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderValue::Int(v) => write!(f, "{}", v),
            HeaderValue::Float(v) => write!(f, "{}", v),
            HeaderValue::Text(s) => write!(f, "{}", s),
            HeaderValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// The header map of one log session.
pub type Headers = HashMap<String, HeaderValue>;
