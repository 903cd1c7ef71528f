//! Synchronous read client core for OData v2 services.
//!
//! # Overview
//! Parses a service's `$metadata` into an `EdmModel`, builds resource URIs,
//! and decodes JSON or Atom feeds and entries into typed `Entry` values,
//! following `$expand` inline content. The core never opens a socket: the
//! caller supplies an `HttpClient` or runs the `build_*`/`parse_*` halves of
//! each read itself (host-does-IO pattern).
//!
//! # Design
//! - `ODataClient` is stateless. It holds only the service root and
//!   `DecodeOptions`.
//! - `EdmModel` is immutable once parsed and can be shared across threads.
//! - Decoding is deterministic for a given (bytes, model, entity set,
//!   options) and bounded by expansion-cycle detection.
//! - Every failure is an `ODataError` variant; nothing panics on bad input.

pub mod client;
pub mod consts;
pub mod decode;
pub mod edm;
pub mod error;
pub mod http;
pub mod render;
pub mod types;
pub mod uri;

pub use client::ODataClient;
pub use decode::{decode_entry, decode_feed, DecodeOptions, Format};
pub use edm::{parse_metadata, EdmEntitySet, EdmEntityType, EdmModel, EdmSimpleType};
pub use error::ODataError;
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use render::{render_entry, render_feed};
pub use types::{Entry, EntryMetadata, Feed, Inline, Properties, PropertyValue, ScalarValue};
pub use uri::{build_resource_uri, metadata_uri, ResourceUri};
