//! OData v2 verbose JSON reader.
//!
//! Envelopes: a feed is `{"d": {"results": [...], "__next": ..}}` or the
//! older bare `{"d": [...]}`; an entry is `{"d": {...}}`. Expanded
//! navigation properties use the same shapes inline, deferred ones are
//! `{"__deferred": {"uri": ..}}`.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use super::scalar::{parse_text, Site};
use super::Decoder;
use crate::edm::{EdmEntityType, EdmProperty, EdmPropertyType, EdmSimpleType, Multiplicity};
use crate::error::ODataError;
use crate::types::{Entry, EntryMetadata, Feed, Inline, Properties, PropertyValue, ScalarValue};

#[derive(Deserialize)]
struct Envelope {
    d: Value,
}

#[derive(Deserialize, Default)]
struct JsonMetadata {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
}

#[derive(Deserialize)]
struct Deferred {
    uri: String,
}

fn envelope(bytes: &[u8], context: &str) -> Result<Value, ODataError> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| ODataError::payload(context, format!("invalid JSON envelope: {e}")))?;
    Ok(envelope.d)
}

pub(super) fn read_feed(dec: &mut Decoder<'_>, bytes: &[u8], ty: &EdmEntityType) -> Result<Feed, ODataError> {
    let context = ty.qualified_name();
    let d = envelope(bytes, &context)?;
    feed_value(dec, &d, ty, &context)
}

pub(super) fn read_entry(dec: &mut Decoder<'_>, bytes: &[u8], ty: &EdmEntityType) -> Result<Entry, ODataError> {
    let context = ty.qualified_name();
    let d = envelope(bytes, &context)?;
    let object = match &d {
        Value::Object(map) => match map.get("results") {
            Some(Value::Object(inner)) => inner,
            _ => map,
        },
        other => {
            return Err(ODataError::payload(
                context,
                format!("expected an entry object, found {}", kind(other)),
            ))
        }
    };
    entry_object(dec, object, ty)
}

fn feed_value(dec: &mut Decoder<'_>, value: &Value, ty: &EdmEntityType, context: &str) -> Result<Feed, ODataError> {
    let (results, envelope) = match value {
        Value::Array(items) => (items, None),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => (items, Some(map)),
            _ => {
                return Err(ODataError::payload(
                    context,
                    "feed object has no \"results\" array",
                ))
            }
        },
        other => {
            return Err(ODataError::payload(
                context,
                format!("expected a feed, found {}", kind(other)),
            ))
        }
    };

    let mut feed = Feed::default();
    for item in results {
        let Value::Object(object) = item else {
            return Err(ODataError::payload(
                context,
                format!("feed item is {}, not an object", kind(item)),
            ));
        };
        feed.entries.push(entry_object(dec, object, ty)?);
    }
    if let Some(map) = envelope {
        feed.next_link = link(map, "__next", context)?;
        feed.delta_link = link(map, "__delta", context)?;
        feed.count = match map.get("__count") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.parse().map_err(|_| {
                ODataError::payload(context, format!("invalid __count '{s}'"))
            })?),
            Some(Value::Number(n)) => n.as_u64(),
            Some(other) => {
                return Err(ODataError::payload(
                    context,
                    format!("__count is {}", kind(other)),
                ))
            }
        };
    }
    Ok(feed)
}

fn link(map: &Map<String, Value>, key: &str, context: &str) -> Result<Option<String>, ODataError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ODataError::payload(
            context,
            format!("{key} is {}, not a string", kind(other)),
        )),
    }
}

fn entry_object(dec: &mut Decoder<'_>, object: &Map<String, Value>, ty: &EdmEntityType) -> Result<Entry, ODataError> {
    let owner = ty.qualified_name();
    let metadata = match object.get("__metadata") {
        Some(raw) => JsonMetadata::deserialize(raw)
            .map_err(|e| ODataError::payload(&owner, format!("invalid __metadata: {e}")))?,
        None => JsonMetadata::default(),
    };
    let mut entry = Entry::new(EntryMetadata {
        id: metadata.id.or_else(|| metadata.uri.clone()),
        uri: metadata.uri,
        etag: metadata.etag,
        type_name: metadata.type_name,
    });

    for prop in &ty.properties {
        let site = Site {
            owner: &owner,
            property: &prop.name,
        };
        let value = match object.get(&prop.name) {
            None | Some(Value::Null) => dec.absent(&owner, prop)?,
            Some(raw) => property_value(dec, prop, raw, site)?,
        };
        entry.insert(prop.name.clone(), value);
    }

    for nav in &ty.navigation_properties {
        let Some(raw) = object.get(&nav.name) else {
            continue;
        };
        let context = format!("{owner}.{}", nav.name);
        let value = match raw {
            Value::Null => PropertyValue::Null,
            Value::Object(map) if map.contains_key("__deferred") => {
                let deferred = Deferred::deserialize(&map["__deferred"])
                    .map_err(|e| ODataError::payload(&context, format!("invalid __deferred: {e}")))?;
                PropertyValue::Deferred(deferred.uri)
            }
            _ => {
                let target = dec.target_type(ty, nav)?;
                let inline = dec.expand(target, |dec| match (nav.multiplicity, raw) {
                    (Multiplicity::Many, _) => feed_value(dec, raw, target, &context).map(Inline::Feed),
                    (_, Value::Object(map)) => entry_object(dec, map, target).map(|e| Inline::Entry(Box::new(e))),
                    (_, other) => Err(ODataError::payload(
                        &context,
                        format!("expected an inline entry, found {}", kind(other)),
                    )),
                })?;
                PropertyValue::Inline(inline)
            }
        };
        entry.insert(nav.name.clone(), value);
    }

    for (name, raw) in object {
        if name.starts_with("__") || ty.property(name).is_some() || ty.navigation_property(name).is_some() {
            continue;
        }
        entry.insert_undeclared(name.clone(), untyped(raw));
    }
    Ok(entry)
}

fn property_value(dec: &Decoder<'_>, prop: &EdmProperty, raw: &Value, site: Site<'_>) -> Result<PropertyValue, ODataError> {
    match &prop.ty {
        EdmPropertyType::Simple(ty) => scalar(*ty, raw, site).map(PropertyValue::Scalar),
        EdmPropertyType::Complex(name) => {
            let Value::Object(object) = raw else {
                return Err(site.mismatch(name.clone(), &raw.to_string()));
            };
            let complex = dec.complex_type(site, name)?;
            let owner = complex.qualified_name();
            let mut props = Properties::new();
            for member in &complex.properties {
                let member_site = Site {
                    owner: &owner,
                    property: &member.name,
                };
                let value = match object.get(&member.name) {
                    None | Some(Value::Null) => dec.absent(&owner, member)?,
                    Some(raw) => property_value(dec, member, raw, member_site)?,
                };
                props.push(member.name.clone(), value);
            }
            for (name, raw) in object {
                if !name.starts_with("__") && !props.contains(name) {
                    props.push(name.clone(), untyped(raw));
                }
            }
            Ok(PropertyValue::Complex(props))
        }
    }
}

/// Coerce a JSON value to `ty`. Wide numeric types may be sent as strings
/// to survive JavaScript number precision; everything else must match.
fn scalar(ty: EdmSimpleType, raw: &Value, site: Site<'_>) -> Result<ScalarValue, ODataError> {
    let mismatch = || site.mismatch(ty.name(), &raw.to_string());
    match (ty, raw) {
        (EdmSimpleType::Boolean, Value::Bool(b)) => Ok(ScalarValue::Boolean(*b)),
        (EdmSimpleType::Boolean, _) => Err(mismatch()),

        (
            EdmSimpleType::Byte | EdmSimpleType::SByte | EdmSimpleType::Int16 | EdmSimpleType::Int32,
            Value::Number(n),
        ) => {
            let Some(v) = n.as_i64() else {
                return Err(mismatch());
            };
            let text = v.to_string();
            parse_text(ty, &text, site)
        }
        (EdmSimpleType::Byte | EdmSimpleType::SByte | EdmSimpleType::Int16 | EdmSimpleType::Int32, _) => {
            Err(mismatch())
        }

        (EdmSimpleType::Int64, Value::Number(n)) => n.as_i64().map(ScalarValue::Int64).ok_or_else(mismatch),
        (EdmSimpleType::Decimal, Value::Number(n)) => BigDecimal::from_str(&n.to_string())
            .map(ScalarValue::Decimal)
            .map_err(|_| site.invalid(ty, &n.to_string())),
        (EdmSimpleType::Double, Value::Number(n)) => n.as_f64().map(ScalarValue::Double).ok_or_else(mismatch),
        (EdmSimpleType::Single, Value::Number(n)) => {
            n.as_f64().map(|v| ScalarValue::Single(v as f32)).ok_or_else(mismatch)
        }

        (_, Value::String(s)) => parse_text(ty, s, site),
        _ => Err(mismatch()),
    }
}

/// Best-effort value for a property the model does not declare.
fn untyped(raw: &Value) -> PropertyValue {
    match raw {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Scalar(ScalarValue::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PropertyValue::Scalar(ScalarValue::Int64(i)),
            None => PropertyValue::Scalar(ScalarValue::Double(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => PropertyValue::Scalar(ScalarValue::String(s.clone())),
        Value::Object(map) => {
            let mut props = Properties::new();
            for (name, value) in map {
                if !name.starts_with("__") {
                    props.push(name.clone(), untyped(value));
                }
            }
            PropertyValue::Complex(props)
        }
        Value::Array(_) => PropertyValue::Scalar(ScalarValue::String(raw.to_string())),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
