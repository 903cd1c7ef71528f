//! Full read sequence against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `ODataClient` over
//! real HTTP using ureq in both wire formats: metadata, both customer
//! pages, a single customer, an order with its customer expanded and a
//! missing entity.

use odata_core::{
    consts::HTTP_HEADER_ACCEPT, render_entry, Format, HttpClient, HttpResponse, ODataClient, ODataError,
    PropertyValue,
};

/// `HttpClient` backed by a ureq agent.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses are returned as data rather than `Err`, letting the core
/// client handle status interpretation.
struct Ureq {
    agent: ureq::Agent,
}

impl Ureq {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl HttpClient for Ureq {
    fn get(&self, uri: &str, accept: &str) -> Result<HttpResponse, ODataError> {
        let mut response = self
            .agent
            .get(uri)
            .header(HTTP_HEADER_ACCEPT, accept)
            .call()
            .map_err(|e| ODataError::Transport(e.to_string()))?;
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ODataError::Transport(e.to_string()))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn scalar(entry: &odata_core::Entry, name: &str) -> String {
    entry
        .get(name)
        .and_then(PropertyValue::as_scalar)
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[test]
fn northwind_read_sequence() {
    let root = start_server();
    let http = Ureq::new();
    let client = ODataClient::new(&root);

    // Step 1: metadata.
    let model = client.read_metadata(&http).unwrap();
    assert_eq!(model.default_container_name(), "NorthwindEntities");

    for format in [Format::Json, Format::Atom] {
        // Step 2: first page of customers, then follow the next link.
        let page1 = client.read_feed(&http, &model, format, "Customers").unwrap();
        assert_eq!(page1.entries.len(), 2, "{format:?}");
        assert_eq!(
            page1.next_link.as_deref(),
            Some(format!("{root}/Customers?$skiptoken='ANATR'").as_str()),
            "{format:?}"
        );

        let page2 = client
            .read_next_page(&http, &model, format, "Customers", &page1)
            .unwrap()
            .expect("second page");
        assert_eq!(scalar(&page2.entries[0], "CustomerID"), "ERNSH", "{format:?}");

        let end = client
            .read_next_page(&http, &model, format, "Customers", &page2)
            .unwrap();
        assert!(end.is_none(), "{format:?}");

        // Step 3: single customer.
        let ernsh = client
            .read_entry(&http, &model, format, "Customers", "'ERNSH'", &[])
            .unwrap();
        assert_eq!(scalar(&ernsh, "City"), "Graz", "{format:?}");
        assert_eq!(
            ernsh.get("Orders"),
            Some(&PropertyValue::Deferred(format!("{root}/Customers('ERNSH')/Orders")))
        );

        // Step 4: order with its customer expanded inline.
        let order = client
            .read_entry(&http, &model, format, "Orders", "10248", &["Customer"])
            .unwrap();
        let customer = order
            .get("Customer")
            .and_then(PropertyValue::as_inline_entry)
            .expect("inline customer");
        assert_eq!(scalar(customer, "CompanyName"), "Vins et alcools Chevalier");
        assert!(render_entry(&order).contains("\n  CustomerID: VINET"));
    }
}

#[test]
fn missing_entity_is_http_404() {
    let root = start_server();
    let http = Ureq::new();
    let client = ODataClient::new(&root);
    let model = client.read_metadata(&http).unwrap();

    let err = client
        .read_entry(&http, &model, Format::Json, "Customers", "'NOPE'", &[])
        .unwrap_err();
    match err {
        ODataError::Http { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Customers('NOPE')"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[test]
fn unreachable_service_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = ODataClient::new(&format!("http://127.0.0.1:{port}"));
    let err = client.read_metadata(&Ureq::new()).unwrap_err();
    assert!(matches!(err, ODataError::Transport(_)), "{err}");
}
