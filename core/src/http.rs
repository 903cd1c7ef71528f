//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. The core builds `HttpRequest`
//! values and parses `HttpResponse` values; executing the round-trip is
//! the job of an `HttpClient` supplied by the caller, which owns
//! connection pooling, TLS, redirects and timeouts. The body is a complete
//! byte buffer: there is no partial-streaming contract.

use crate::consts::HTTP_HEADER_ACCEPT;
use crate::error::ODataError;

/// A GET request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: String, accept: &str) -> Self {
        Self {
            url,
            headers: vec![(HTTP_HEADER_ACCEPT.to_string(), accept.to_string())],
        }
    }

    /// Value of the `Accept` header.
    pub fn accept(&self) -> &str {
        header(&self.headers, HTTP_HEADER_ACCEPT).unwrap_or_default()
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// The GET capability the client needs from its host.
///
/// `accept` is the media type to send in the `Accept` header.
/// Implementations return `ODataError::Transport` when no response was
/// received at all; 4xx/5xx responses are returned as data.
pub trait HttpClient {
    fn get(&self, uri: &str, accept: &str) -> Result<HttpResponse, ODataError>;
}

impl<F> HttpClient for F
where
    F: Fn(&str, &str) -> Result<HttpResponse, ODataError>,
{
    fn get(&self, uri: &str, accept: &str) -> Result<HttpResponse, ODataError> {
        self(uri, accept)
    }
}

/// Map a 4xx/5xx status to `ODataError::Http` without touching the body as
/// a payload.
pub fn check_status(response: &HttpResponse) -> Result<(), ODataError> {
    if (400..=599).contains(&response.status) {
        return Err(ODataError::Http {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }
    Ok(())
}
