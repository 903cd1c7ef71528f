//! Header names, media types and URI segments shared by the client.

pub const HTTP_METHOD_GET: &str = "GET";
pub const HTTP_HEADER_ACCEPT: &str = "Accept";
pub const HTTP_HEADER_CONTENT_TYPE: &str = "Content-Type";

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const APPLICATION_ATOM_XML: &str = "application/atom+xml";

pub const METADATA: &str = "$metadata";
pub const SEPARATOR: &str = "/";

/// Namespace of `m:` attributes and elements (null markers, inline, count).
pub const NS_METADATA: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
/// Namespace of `d:` property elements.
pub const NS_DATA: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";
pub const NS_ATOM: &str = "http://www.w3.org/2005/Atom";
/// Prefix of Atom link relations pointing at navigation properties.
pub const REL_RELATED: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/related/";
