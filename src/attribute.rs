//! Attribute data carried through the resolution graph

use serde::{Deserialize, Serialize};

/// A single typed attribute value.
///
/// Transform stages (value maps, scoping, regex splitting) operate on
/// string values; feeding `Bytes` into a string-typed transform is a
/// per-definition resolution failure, not a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    /// Plain string value
    Str(String),
    /// Value qualified by an administrative scope (rendered `value@scope`)
    Scoped { value: String, scope: String },
    /// Opaque binary value (e.g. certificates, photos)
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Create a scoped value
    pub fn scoped(value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Scoped {
            value: value.into(),
            scope: scope.into(),
        }
    }

    /// The string content, if this value is string-typed.
    ///
    /// Scoped values expose their local part; `Bytes` returns `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Scoped { value, .. } => Some(value),
            Self::Bytes(_) => None,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Scoped { value, scope } => write!(f, "{}@{}", value, scope),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// A named attribute: an id plus an ordered sequence of values.
///
/// Duplicate values are permitted at this layer; deduplication, where it
/// happens, is a definition-specific transform policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute id/name
    pub id: String,
    /// Ordered values
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    /// Create an attribute with no values
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Append a value (builder style)
    pub fn with_value(mut self, value: impl Into<AttributeValue>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Create an attribute from an iterator of string values
    pub fn from_strings<I, S>(id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            values: values
                .into_iter()
                .map(|v| AttributeValue::Str(v.into()))
                .collect(),
        }
    }

    /// True if the attribute carries no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_value_displays_with_delimiter() {
        let v = AttributeValue::scoped("member", "example.org");
        assert_eq!(v.to_string(), "member@example.org");
    }

    #[test]
    fn bytes_have_no_string_content() {
        let v = AttributeValue::Bytes(vec![0xde, 0xad]);
        assert!(v.as_str().is_none());
    }

    #[test]
    fn attribute_preserves_value_order_and_duplicates() {
        let attr = Attribute::from_strings("affiliation", ["member", "staff", "member"]);
        let rendered: Vec<String> = attr.values.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["member", "staff", "member"]);
    }

    #[test]
    fn value_serializes_tagged() {
        let v = AttributeValue::string("member");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "str");
        assert_eq!(json["value"], "member");
    }

    #[test]
    fn attribute_roundtrip() {
        let attr = Attribute::new("mail")
            .with_value("jdoe@example.org")
            .with_value(AttributeValue::scoped("jdoe", "example.org"));
        let json = serde_json::to_string(&attr).unwrap();
        let back: Attribute = serde_json::from_str(&json).unwrap();
        assert_eq!(attr, back);
    }
}
