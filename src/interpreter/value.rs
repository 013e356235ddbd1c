//! Values exchanged with the embedded interpreter.
//!
//! Only the shapes the httpd protocol can produce or consume are modelled:
//! atomic vectors, generic vectors (lists), raw buffers and opaque references
//! to closures and environments owned by the interpreter. Anything else comes
//! back as [`Value::Other`] carrying the interpreter's type name.

use std::fmt;

use indexmap::IndexMap;

/// Opaque handle to an interpreter-owned object (closure, environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Logical(Vec<bool>),
    Integer(Vec<i32>),
    Double(Vec<f64>),
    Character {
        values: Vec<String>,
        names: Option<Vec<String>>,
    },
    /// Raw byte buffer; request bodies carry their content type as an attribute.
    Raw {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// Generic vector.
    List {
        values: Vec<Value>,
        names: Option<Vec<String>>,
    },
    Closure(ObjectRef),
    Environment(ObjectRef),
    Other(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Character {
            values: vec![s.into()],
            names: None,
        }
    }

    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Character {
            values: values.into_iter().map(Into::into).collect(),
            names: None,
        }
    }

    /// Named character vector built from an ordered mapping.
    pub fn named_strings(map: IndexMap<String, String>) -> Self {
        let (names, values) = map.into_iter().unzip();
        Value::Character {
            values,
            names: Some(names),
        }
    }

    pub fn list(values: Vec<Value>) -> Self {
        Value::List {
            values,
            names: None,
        }
    }

    pub fn named_list<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (names, values) = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        Value::List {
            values,
            names: Some(names),
        }
    }

    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Raw {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn raw_with_content_type(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Value::Raw {
            bytes: bytes.into(),
            content_type: Some(content_type.into()),
        }
    }

    pub fn integer(n: i32) -> Self {
        Value::Integer(vec![n])
    }

    pub fn logical(b: bool) -> Self {
        Value::Logical(vec![b])
    }

    /// The interpreter-side type name, as `typeof()` would report it.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "NULL",
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Character { .. } => "character",
            Value::Raw { .. } => "raw",
            Value::List { .. } => "list",
            Value::Closure(_) => "closure",
            Value::Environment(_) => "environment",
            Value::Other(name) => name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Logical(v) => v.len(),
            Value::Integer(v) => v.len(),
            Value::Double(v) => v.len(),
            Value::Character { values, .. } => values.len(),
            Value::Raw { bytes, .. } => bytes.len(),
            Value::List { values, .. } => values.len(),
            Value::Closure(_) | Value::Environment(_) | Value::Other(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_closure(&self) -> bool {
        matches!(self, Value::Closure(_))
    }

    pub fn names(&self) -> Option<&[String]> {
        match self {
            Value::Character { names, .. } | Value::List { names, .. } => names.as_deref(),
            _ => None,
        }
    }

    /// Element `index` of a generic vector.
    pub fn list_element(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List { values, .. } => values.get(index),
            _ => None,
        }
    }

    /// Element `index` of a character vector, or of a list element holding a string.
    pub fn string_element(&self, index: usize) -> Option<String> {
        match self {
            Value::Character { values, .. } => values.get(index).cloned(),
            Value::List { values, .. } => values.get(index).and_then(Value::as_scalar_string),
            _ => None,
        }
    }

    /// Coerce the first element to a string.
    pub fn as_scalar_string(&self) -> Option<String> {
        match self {
            Value::Character { values, .. } => values.first().cloned(),
            Value::Integer(v) => v.first().map(|n| n.to_string()),
            Value::Double(v) => v.first().map(|d| d.to_string()),
            Value::Logical(v) => v
                .first()
                .map(|b| if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Raw { bytes, .. } => bytes.first().map(|b| format!("{:02x}", b)),
            Value::List { values, .. } => values.first().and_then(Value::as_scalar_string),
            _ => None,
        }
    }

    /// Coerce the first element to an integer.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => v.first().copied(),
            Value::Double(v) => v
                .first()
                .filter(|d| d.is_finite())
                .map(|d| d.trunc() as i32),
            Value::Logical(v) => v.first().map(|b| *b as i32),
            Value::Character { values, .. } => {
                values.first().and_then(|s| s.trim().parse::<i32>().ok())
            }
            Value::List { values, .. } => values.first().and_then(Value::as_integer),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Closure(r) => write!(f, "<closure {}>", r.0),
            Value::Environment(r) => write!(f, "<environment {}>", r.0),
            Value::Other(name) => write!(f, "<{}>", name),
            Value::Raw { bytes, .. } => write!(f, "<raw {} bytes>", bytes.len()),
            other => match other.as_scalar_string() {
                Some(s) if other.len() == 1 => write!(f, "{}", s),
                _ => write!(f, "<{} of length {}>", other.type_name(), other.len()),
            },
        }
    }
}
