//! Feed and entry decoding against an `EdmModel`.
//!
//! # Design
//! Decoding is a pure function of (bytes, model, entity set, options). The
//! body is fully buffered before it reaches the decoder, which keeps both
//! readers simple at the cost of holding the payload in memory; entity
//! payloads are bounded, media streams are not supported.
//!
//! The JSON and Atom readers share one `Decoder`: it owns the strictness
//! policy, resolves navigation targets and complex types through the model,
//! and tracks the chain of entity types being expanded so that an
//! expansion which re-enters a type on that chain fails with
//! `ExpansionCycle` instead of recursing without bound.

mod atom;
mod json;
mod scalar;

use tracing::debug;

use crate::consts::{APPLICATION_ATOM_XML, APPLICATION_JSON, APPLICATION_XML};
use crate::edm::{
    EdmComplexType, EdmEntitySet, EdmEntityType, EdmModel, EdmNavigationProperty, EdmProperty,
};
use crate::error::ODataError;
use crate::types::{Entry, Feed, PropertyValue};

pub(crate) use scalar::Site;

/// Wire format of a feed or entry document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// OData v2 verbose JSON (`{"d": ...}`).
    Json,
    /// Atom XML.
    Atom,
}

impl Format {
    /// Value for the `Accept` header.
    pub fn accept(self) -> &'static str {
        match self {
            Format::Json => APPLICATION_JSON,
            Format::Atom => APPLICATION_XML,
        }
    }

    /// Pick the format for a `Content-Type`, ignoring parameters.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            APPLICATION_JSON => Some(Format::Json),
            APPLICATION_XML | APPLICATION_ATOM_XML => Some(Format::Atom),
            _ => None,
        }
    }
}

/// Knobs for a single decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail on an absent non-nullable property instead of yielding `Null`.
    pub strict: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl DecodeOptions {
    pub fn relaxed() -> Self {
        Self { strict: false }
    }
}

/// Decode a feed of `entity_set` members.
pub fn decode_feed(
    bytes: &[u8],
    format: Format,
    model: &EdmModel,
    entity_set: &EdmEntitySet,
    options: DecodeOptions,
) -> Result<Feed, ODataError> {
    let ty = model.entity_type_of(entity_set)?;
    let mut decoder = Decoder::new(model, options);
    let feed = decoder.expand(ty, |dec| match format {
        Format::Json => json::read_feed(dec, bytes, ty),
        Format::Atom => atom::read_feed(dec, bytes, ty),
    })?;
    debug!(
        entity_set = %entity_set.name,
        entries = feed.entries.len(),
        next_link = feed.next_link.as_deref().unwrap_or(""),
        "decoded feed"
    );
    Ok(feed)
}

/// Decode a single member of `entity_set`.
pub fn decode_entry(
    bytes: &[u8],
    format: Format,
    model: &EdmModel,
    entity_set: &EdmEntitySet,
    options: DecodeOptions,
) -> Result<Entry, ODataError> {
    let ty = model.entity_type_of(entity_set)?;
    let mut decoder = Decoder::new(model, options);
    let entry = decoder.expand(ty, |dec| match format {
        Format::Json => json::read_entry(dec, bytes, ty),
        Format::Atom => atom::read_entry(dec, bytes, ty),
    })?;
    debug!(entity_set = %entity_set.name, properties = entry.properties().len(), "decoded entry");
    Ok(entry)
}

/// State shared by the format readers for one decode call.
pub(crate) struct Decoder<'m> {
    model: &'m EdmModel,
    options: DecodeOptions,
    /// Qualified names of the entity types currently being expanded.
    path: Vec<String>,
}

impl<'m> Decoder<'m> {
    fn new(model: &'m EdmModel, options: DecodeOptions) -> Self {
        Self {
            model,
            options,
            path: Vec::new(),
        }
    }

    /// Run `f` with `ty` pushed on the expansion chain.
    pub(crate) fn expand<T>(
        &mut self,
        ty: &EdmEntityType,
        f: impl FnOnce(&mut Self) -> Result<T, ODataError>,
    ) -> Result<T, ODataError> {
        let name = ty.qualified_name();
        if self.path.contains(&name) {
            let mut chain = self.path.clone();
            chain.push(name);
            return Err(ODataError::ExpansionCycle {
                path: chain.join(" -> "),
            });
        }
        self.path.push(name);
        let result = f(self);
        self.path.pop();
        result
    }

    /// Value of a declared property that is absent or explicitly null.
    pub(crate) fn absent(&self, owner: &str, prop: &EdmProperty) -> Result<PropertyValue, ODataError> {
        if prop.nullable || !self.options.strict {
            return Ok(PropertyValue::Null);
        }
        Err(ODataError::MissingProperty {
            entity_type: owner.to_string(),
            property: prop.name.clone(),
        })
    }

    pub(crate) fn target_type(
        &self,
        owner: &EdmEntityType,
        nav: &EdmNavigationProperty,
    ) -> Result<&'m EdmEntityType, ODataError> {
        self.model.entity_type(&nav.target_type).ok_or_else(|| {
            ODataError::payload(
                format!("{}.{}", owner.qualified_name(), nav.name),
                format!("inline content references unknown type '{}'", nav.target_type),
            )
        })
    }

    pub(crate) fn complex_type(&self, site: Site<'_>, name: &str) -> Result<&'m EdmComplexType, ODataError> {
        self.model.complex_type(name).ok_or_else(|| {
            ODataError::payload(
                format!("{}.{}", site.owner, site.property),
                format!("unknown complex type '{name}'"),
            )
        })
    }
}
