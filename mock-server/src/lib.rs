//! Read-only Northwind subset served over OData v2.
//!
//! # Design
//! Every resource is a canned document from `test-vectors/`. The canonical
//! service root baked into the fixtures is rewritten to `http://{Host}` on
//! the way out, so links in the payloads (`__next`, `__deferred`,
//! `xml:base`) point back at this server. The format follows the `Accept`
//! header: anything mentioning `json` gets verbose JSON, the rest gets Atom.

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::debug;

/// Service root the fixtures were captured from.
pub const CANONICAL_ROOT: &str = "http://services.odata.org/V2/Northwind/Northwind.svc";

const METADATA: &str = include_str!("../../test-vectors/metadata.xml");

const CUSTOMERS_PAGE1: Payload = Payload {
    kind: Kind::Feed,
    json: include_str!("../../test-vectors/customers_page1.json"),
    atom: include_str!("../../test-vectors/customers_page1.xml"),
};
const CUSTOMERS_PAGE2: Payload = Payload {
    kind: Kind::Feed,
    json: include_str!("../../test-vectors/customers_page2.json"),
    atom: include_str!("../../test-vectors/customers_page2.xml"),
};
const CUSTOMER_ERNSH: Payload = Payload {
    kind: Kind::Entry,
    json: include_str!("../../test-vectors/customer_ernsh.json"),
    atom: include_str!("../../test-vectors/customer_ernsh.xml"),
};
const ORDER_10248: Payload = Payload {
    kind: Kind::Entry,
    json: include_str!("../../test-vectors/order_10248.json"),
    atom: include_str!("../../test-vectors/order_10248.xml"),
};
const ORDER_10248_EXPANDED: Payload = Payload {
    kind: Kind::Entry,
    json: include_str!("../../test-vectors/order_10248_expanded.json"),
    atom: include_str!("../../test-vectors/order_10248_expanded.xml"),
};

#[derive(Clone, Copy)]
enum Kind {
    Feed,
    Entry,
}

#[derive(Clone, Copy)]
struct Payload {
    kind: Kind,
    json: &'static str,
    atom: &'static str,
}

/// System query options the server understands; others are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct QueryOptions {
    #[serde(rename = "$skiptoken")]
    pub skiptoken: Option<String>,
    #[serde(rename = "$expand")]
    pub expand: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/{segment}", get(resource))
        .route("/{segment}/", get(resource))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn resource(
    Path(segment): Path<String>,
    Query(options): Query<QueryOptions>,
    headers: HeaderMap,
) -> Response {
    let root = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_else(|| CANONICAL_ROOT.to_string());
    let json = headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|accept| accept.contains("json"));
    debug!(%segment, ?options, json, "serving resource");

    if segment == "$metadata" {
        return ([(header::CONTENT_TYPE, "application/xml;charset=utf-8")], METADATA).into_response();
    }

    let Some(payload) = lookup(&segment, &options) else {
        return not_found(&segment);
    };
    let (content_type, body) = match (json, payload.kind) {
        (true, _) => ("application/json;charset=utf-8", payload.json),
        (false, Kind::Feed) => ("application/atom+xml;type=feed;charset=utf-8", payload.atom),
        (false, Kind::Entry) => ("application/atom+xml;type=entry;charset=utf-8", payload.atom),
    };
    ([(header::CONTENT_TYPE, content_type)], body.replace(CANONICAL_ROOT, &root)).into_response()
}

fn lookup(segment: &str, options: &QueryOptions) -> Option<Payload> {
    match segment {
        "Customers" => match options.skiptoken.as_deref() {
            None => Some(CUSTOMERS_PAGE1),
            Some("'ANATR'") => Some(CUSTOMERS_PAGE2),
            Some(_) => None,
        },
        "Customers('ERNSH')" => Some(CUSTOMER_ERNSH),
        "Orders(10248)" => match options.expand.as_deref() {
            None => Some(ORDER_10248),
            Some("Customer") => Some(ORDER_10248_EXPANDED),
            Some(_) => None,
        },
        _ => None,
    }
}

fn not_found(segment: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain;charset=utf-8")],
        format!("Resource not found for the segment '{segment}'."),
    )
        .into_response()
}
