//! Decoded records: entries, feeds and the values inside them.
//!
//! # Design
//! Every property value is a `PropertyValue`, a closed tagged union, so a
//! consumer handles scalars, complex values, inline expansions, deferred
//! links and nulls exhaustively instead of probing runtime types.
//! Properties keep a stable order (declared properties first, in
//! declaration order, then navigation properties, then undeclared
//! properties in document order), which makes decoding deterministic and
//! printing reproducible.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::edm::EdmSimpleType;

/// A primitive value, tagged with the EDM type it was decoded as.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Binary(Vec<u8>),
    Boolean(bool),
    Byte(u8),
    SByte(i8),
    /// An instant with millisecond precision, always in UTC.
    DateTime(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    /// Time of day.
    Time(NaiveTime),
    Decimal(BigDecimal),
    Double(f64),
    Single(f32),
    Guid(Uuid),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    String(String),
}

impl ScalarValue {
    pub fn edm_type(&self) -> EdmSimpleType {
        match self {
            ScalarValue::Binary(_) => EdmSimpleType::Binary,
            ScalarValue::Boolean(_) => EdmSimpleType::Boolean,
            ScalarValue::Byte(_) => EdmSimpleType::Byte,
            ScalarValue::SByte(_) => EdmSimpleType::SByte,
            ScalarValue::DateTime(_) => EdmSimpleType::DateTime,
            ScalarValue::DateTimeOffset(_) => EdmSimpleType::DateTimeOffset,
            ScalarValue::Time(_) => EdmSimpleType::Time,
            ScalarValue::Decimal(_) => EdmSimpleType::Decimal,
            ScalarValue::Double(_) => EdmSimpleType::Double,
            ScalarValue::Single(_) => EdmSimpleType::Single,
            ScalarValue::Guid(_) => EdmSimpleType::Guid,
            ScalarValue::Int16(_) => EdmSimpleType::Int16,
            ScalarValue::Int32(_) => EdmSimpleType::Int32,
            ScalarValue::Int64(_) => EdmSimpleType::Int64,
            ScalarValue::String(_) => EdmSimpleType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Milliseconds since the Unix epoch for date/time values.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            ScalarValue::DateTime(dt) => Some(dt.timestamp_millis()),
            ScalarValue::DateTimeOffset(dt) => Some(dt.timestamp_millis()),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Binary(bytes) => f.write_str(&STANDARD.encode(bytes)),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Byte(v) => write!(f, "{v}"),
            ScalarValue::SByte(v) => write!(f, "{v}"),
            ScalarValue::DateTime(dt) => {
                f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            ScalarValue::DateTimeOffset(dt) => {
                f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, false))
            }
            ScalarValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            ScalarValue::Decimal(v) => write!(f, "{v}"),
            ScalarValue::Double(v) => write!(f, "{v}"),
            ScalarValue::Single(v) => write!(f, "{v}"),
            ScalarValue::Guid(v) => write!(f, "{v}"),
            ScalarValue::Int16(v) => write!(f, "{v}"),
            ScalarValue::Int32(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::String(v) => f.write_str(v),
        }
    }
}

/// Ordered name/value pairs of an entry or a complex value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.0.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The value of one property of a decoded entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(ScalarValue),
    Complex(Properties),
    /// An expanded navigation property.
    Inline(Inline),
    /// A navigation property that was not expanded; holds the link URI.
    Deferred(String),
    Null,
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            PropertyValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_inline_entry(&self) -> Option<&Entry> {
        match self {
            PropertyValue::Inline(Inline::Entry(entry)) => Some(entry),
            _ => None,
        }
    }

    pub fn as_inline_feed(&self) -> Option<&Feed> {
        match self {
            PropertyValue::Inline(Inline::Feed(feed)) => Some(feed),
            _ => None,
        }
    }
}

/// Inline content of an expanded navigation property.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Entry(Box<Entry>),
    Feed(Feed),
}

/// Service-provided metadata of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryMetadata {
    /// Canonical (edit) URI of the entity.
    pub uri: Option<String>,
    /// Atom `<id>`; usually equal to `uri`.
    pub id: Option<String>,
    pub etag: Option<String>,
    /// Qualified entity type name reported by the service.
    pub type_name: Option<String>,
}

/// One decoded entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    pub metadata: EntryMetadata,
    properties: Properties,
    undeclared: Vec<String>,
}

impl Entry {
    pub fn new(metadata: EntryMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.push(name, value);
    }

    /// Keep a property the entity type does not declare, and flag it.
    pub(crate) fn insert_undeclared(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        self.undeclared.push(name.clone());
        self.properties.push(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Names of properties present in the payload but absent from the
    /// entity type, in document order.
    pub fn undeclared(&self) -> &[String] {
        &self.undeclared
    }
}

/// An ordered page of entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feed {
    /// Entries in server order.
    pub entries: Vec<Entry>,
    /// URI of the next page, absent on the last page.
    pub next_link: Option<String>,
    /// URI to request changes since this feed was produced.
    pub delta_link: Option<String>,
    /// Total count when `$inlinecount=allpages` was requested.
    pub count: Option<u64>,
}

impl Feed {
    pub fn has_next(&self) -> bool {
        self.next_link.is_some()
    }
}
