//! Client facade: metadata, feed and entry reads.
//!
//! # Design
//! `ODataClient` holds only the service root and decode options and carries
//! no mutable state between calls. Every read is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`, so a host can run the round-trip itself.
//! The `read_*` methods compose the two around an `HttpClient`. Nothing is
//! retried; status codes 400..=599 fail before any decoding.

use tracing::{debug, trace};

use crate::consts::{APPLICATION_XML, HTTP_HEADER_CONTENT_TYPE, HTTP_METHOD_GET};
use crate::decode::{decode_entry, decode_feed, DecodeOptions, Format};
use crate::edm::EdmModel;
use crate::error::ODataError;
use crate::http::{check_status, HttpClient, HttpRequest, HttpResponse};
use crate::types::{Entry, Feed};
use crate::uri::{build_resource_uri, metadata_uri};

/// Stateless client for one OData v2 service.
#[derive(Debug, Clone)]
pub struct ODataClient {
    service_url: String,
    options: DecodeOptions,
}

impl ODataClient {
    pub fn new(service_url: &str) -> Self {
        Self {
            service_url: service_url.trim_end_matches('/').to_string(),
            options: DecodeOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn build_metadata_request(&self) -> HttpRequest {
        HttpRequest::get(metadata_uri(&self.service_url), APPLICATION_XML)
    }

    pub fn build_feed_request(&self, format: Format, entity_set: &str) -> HttpRequest {
        HttpRequest::get(
            build_resource_uri(&self.service_url, entity_set, None, &[]),
            format.accept(),
        )
    }

    /// `key` is a pre-formatted key predicate, e.g. `'ALFKI'` or `10248`.
    pub fn build_entry_request(
        &self,
        format: Format,
        entity_set: &str,
        key: &str,
        expand: &[&str],
    ) -> HttpRequest {
        HttpRequest::get(
            build_resource_uri(&self.service_url, entity_set, Some(key), expand),
            format.accept(),
        )
    }

    pub fn parse_metadata(&self, response: HttpResponse) -> Result<EdmModel, ODataError> {
        check_status(&response)?;
        EdmModel::parse(&response.body)
    }

    pub fn parse_feed(
        &self,
        model: &EdmModel,
        format: Format,
        entity_set: &str,
        response: HttpResponse,
    ) -> Result<Feed, ODataError> {
        check_status(&response)?;
        check_content_type(&response, format, entity_set)?;
        let set = model.entity_set(entity_set)?;
        decode_feed(&response.body, format, model, set, self.options)
    }

    pub fn parse_entry(
        &self,
        model: &EdmModel,
        format: Format,
        entity_set: &str,
        response: HttpResponse,
    ) -> Result<Entry, ODataError> {
        check_status(&response)?;
        check_content_type(&response, format, entity_set)?;
        let set = model.entity_set(entity_set)?;
        decode_entry(&response.body, format, model, set, self.options)
    }

    /// GET `{service}/$metadata` and parse it.
    pub fn read_metadata(&self, http: &impl HttpClient) -> Result<EdmModel, ODataError> {
        let response = execute(http, &self.build_metadata_request())?;
        self.parse_metadata(response)
    }

    pub fn read_feed(
        &self,
        http: &impl HttpClient,
        model: &EdmModel,
        format: Format,
        entity_set: &str,
    ) -> Result<Feed, ODataError> {
        model.entity_set(entity_set)?;
        let response = execute(http, &self.build_feed_request(format, entity_set))?;
        self.parse_feed(model, format, entity_set, response)
    }

    /// Follow `feed.next_link`, if any. Pagination is always explicit.
    pub fn read_next_page(
        &self,
        http: &impl HttpClient,
        model: &EdmModel,
        format: Format,
        entity_set: &str,
        feed: &Feed,
    ) -> Result<Option<Feed>, ODataError> {
        let Some(next) = &feed.next_link else {
            return Ok(None);
        };
        model.entity_set(entity_set)?;
        let response = execute(http, &HttpRequest::get(next.clone(), format.accept()))?;
        self.parse_feed(model, format, entity_set, response).map(Some)
    }

    pub fn read_entry(
        &self,
        http: &impl HttpClient,
        model: &EdmModel,
        format: Format,
        entity_set: &str,
        key: &str,
        expand: &[&str],
    ) -> Result<Entry, ODataError> {
        model.entity_set(entity_set)?;
        let request = self.build_entry_request(format, entity_set, key, expand);
        let response = execute(http, &request)?;
        self.parse_entry(model, format, entity_set, response)
    }
}

fn execute(http: &impl HttpClient, request: &HttpRequest) -> Result<HttpResponse, ODataError> {
    debug!(method = HTTP_METHOD_GET, url = %request.url, accept = request.accept(), "sending request");
    let response = http.get(&request.url, request.accept())?;
    debug!(status = response.status, bytes = response.body.len(), "received response");
    trace!(
        url = %request.url,
        content = %String::from_utf8_lossy(&response.body),
        "raw content"
    );
    Ok(response)
}

/// A `Content-Type` naming the other wire format fails here rather than
/// deep inside the wrong reader. Unknown or missing types pass through.
fn check_content_type(response: &HttpResponse, format: Format, entity_set: &str) -> Result<(), ODataError> {
    let Some(content_type) = response.header(HTTP_HEADER_CONTENT_TYPE) else {
        return Ok(());
    };
    match Format::from_media_type(content_type) {
        Some(sent) if sent != format => Err(ODataError::payload(
            entity_set,
            format!("requested {format:?} but server sent '{content_type}'"),
        )),
        _ => Ok(()),
    }
}
