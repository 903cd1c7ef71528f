//! Decode the shared fixtures in `test-vectors/` in both wire formats.
//!
//! The JSON and Atom documents describe the same entities, so most checks
//! run once per format and then compare the two results.

use odata_core::{
    decode_entry, decode_feed, parse_metadata, DecodeOptions, EdmModel, EdmSimpleType, Entry,
    Feed, Format, PropertyValue, ScalarValue,
};

const ROOT: &str = "http://services.odata.org/V2/Northwind/Northwind.svc";

fn model() -> EdmModel {
    parse_metadata(include_bytes!("../../test-vectors/metadata.xml")).unwrap()
}

fn feed(model: &EdmModel, set: &str, format: Format, bytes: &[u8]) -> Feed {
    let set = model.entity_set(set).unwrap();
    decode_feed(bytes, format, model, set, DecodeOptions::default()).unwrap()
}

fn entry(model: &EdmModel, set: &str, format: Format, bytes: &[u8]) -> Entry {
    let set = model.entity_set(set).unwrap();
    decode_entry(bytes, format, model, set, DecodeOptions::default()).unwrap()
}

fn text(entry: &Entry, name: &str) -> String {
    entry
        .get(name)
        .and_then(PropertyValue::as_scalar)
        .map(ToString::to_string)
        .unwrap_or_else(|| panic!("{name} is not a scalar"))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[test]
fn metadata_lists_northwind_sets() {
    let model = model();
    assert_eq!(model.default_container_name(), "NorthwindEntities");
    let names: Vec<_> = model.entity_sets().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Customers", "Orders"]);

    let order = model.entity_type_of(model.entity_set("Orders").unwrap()).unwrap();
    assert_eq!(order.key, ["OrderID"]);
    let freight = order.property("Freight").unwrap();
    assert!(freight.nullable);
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[test]
fn customers_first_page() {
    let model = model();
    let cases: [(Format, &[u8]); 2] = [
        (Format::Json, include_bytes!("../../test-vectors/customers_page1.json")),
        (Format::Atom, include_bytes!("../../test-vectors/customers_page1.xml")),
    ];
    for (format, bytes) in cases {
        let page = feed(&model, "Customers", format, bytes);
        let ids: Vec<_> = page.entries.iter().map(|e| text(e, "CustomerID")).collect();
        assert_eq!(ids, ["ALFKI", "ANATR"], "{format:?}");
        assert_eq!(
            page.next_link.as_deref(),
            Some(format!("{ROOT}/Customers?$skiptoken='ANATR'").as_str()),
            "{format:?}"
        );
        assert_eq!(text(&page.entries[1], "City"), "México D.F.");
    }
}

#[test]
fn customers_last_page_has_no_next_link() {
    let model = model();
    let cases: [(Format, &[u8]); 2] = [
        (Format::Json, include_bytes!("../../test-vectors/customers_page2.json")),
        (Format::Atom, include_bytes!("../../test-vectors/customers_page2.xml")),
    ];
    for (format, bytes) in cases {
        let page = feed(&model, "Customers", format, bytes);
        assert_eq!(page.entries.len(), 1, "{format:?}");
        assert!(!page.has_next(), "{format:?}");
        assert_eq!(text(&page.entries[0], "CustomerID"), "ERNSH");
    }
}

#[test]
fn feed_formats_agree() {
    let model = model();
    let json = feed(
        &model,
        "Customers",
        Format::Json,
        include_bytes!("../../test-vectors/customers_page1.json"),
    );
    let atom = feed(
        &model,
        "Customers",
        Format::Atom,
        include_bytes!("../../test-vectors/customers_page1.xml"),
    );
    assert_eq!(json.next_link, atom.next_link);
    for (j, a) in json.entries.iter().zip(&atom.entries) {
        assert_eq!(j.properties(), a.properties());
        assert_eq!(j.metadata.uri, a.metadata.uri);
        assert_eq!(j.metadata.type_name, a.metadata.type_name);
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[test]
fn single_customer() {
    let model = model();
    let cases: [(Format, &[u8]); 2] = [
        (Format::Json, include_bytes!("../../test-vectors/customer_ernsh.json")),
        (Format::Atom, include_bytes!("../../test-vectors/customer_ernsh.xml")),
    ];
    for (format, bytes) in cases {
        let ernsh = entry(&model, "Customers", format, bytes);
        assert_eq!(text(&ernsh, "CompanyName"), "Ernst Handel", "{format:?}");
        assert_eq!(
            ernsh.metadata.uri.as_deref(),
            Some(format!("{ROOT}/Customers('ERNSH')").as_str())
        );
        assert_eq!(
            ernsh.get("Orders"),
            Some(&PropertyValue::Deferred(format!("{ROOT}/Customers('ERNSH')/Orders")))
        );
        assert!(ernsh.undeclared().is_empty());
    }
}

#[test]
fn order_scalars_are_typed() {
    let model = model();
    let cases: [(Format, &[u8]); 2] = [
        (Format::Json, include_bytes!("../../test-vectors/order_10248.json")),
        (Format::Atom, include_bytes!("../../test-vectors/order_10248.xml")),
    ];
    for (format, bytes) in cases {
        let order = entry(&model, "Orders", format, bytes);
        assert_eq!(
            order.get("OrderID").and_then(PropertyValue::as_scalar),
            Some(&ScalarValue::Int32(10248)),
            "{format:?}"
        );
        let date = order.get("OrderDate").and_then(PropertyValue::as_scalar).unwrap();
        assert_eq!(date.edm_type(), EdmSimpleType::DateTime);
        assert_eq!(date.epoch_millis(), Some(836_438_400_000), "{format:?}");

        let freight = order.get("Freight").and_then(PropertyValue::as_scalar).unwrap();
        assert_eq!(freight.edm_type(), EdmSimpleType::Decimal);
        assert_eq!(freight.to_string(), "32.3800");

        assert_eq!(
            order.get("Customer"),
            Some(&PropertyValue::Deferred(format!("{ROOT}/Orders(10248)/Customer")))
        );
    }
}

#[test]
fn order_with_inline_customer() {
    let model = model();
    let cases: [(Format, &[u8]); 2] = [
        (Format::Json, include_bytes!("../../test-vectors/order_10248_expanded.json")),
        (Format::Atom, include_bytes!("../../test-vectors/order_10248_expanded.xml")),
    ];
    for (format, bytes) in cases {
        let order = entry(&model, "Orders", format, bytes);
        let customer = order
            .get("Customer")
            .and_then(PropertyValue::as_inline_entry)
            .unwrap_or_else(|| panic!("{format:?}: Customer not inline"));
        assert_eq!(text(customer, "CustomerID"), "VINET");
        assert_eq!(text(customer, "City"), "Reims");
        assert_eq!(customer.metadata.type_name.as_deref(), Some("NorthwindModel.Customer"));
        // The nested customer's own orders stay deferred.
        assert!(matches!(customer.get("Orders"), Some(PropertyValue::Deferred(_))));
    }
}

#[test]
fn entry_payload_decoded_as_feed_is_rejected() {
    let model = model();
    let set = model.entity_set("Customers").unwrap();
    let err = decode_feed(
        include_bytes!("../../test-vectors/customer_ernsh.xml"),
        Format::Atom,
        &model,
        set,
        DecodeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, odata_core::ODataError::MalformedPayload { .. }), "{err}");
}
