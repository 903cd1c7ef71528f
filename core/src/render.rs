//! Indented text rendering of decoded entries.
//!
//! # Design
//! One recursive walk over `PropertyValue`. Each property renders as
//! `name: value` on its own line, nested values are indented by two spaces
//! per level and inline feeds list their entries in `[ ... ]` blocks inside
//! `{ ... }`. The output has no trailing newline.

use std::fmt::Write;

use crate::types::{Entry, Feed, Inline, Properties, PropertyValue};

const INDENT: &str = "  ";

/// Render an entry's properties, declared and undeclared, in order.
pub fn render_entry(entry: &Entry) -> String {
    let mut out = String::new();
    properties(&mut out, entry.properties(), 0);
    out
}

/// Render every entry of a feed, separated by blank lines.
pub fn render_feed(feed: &Feed) -> String {
    feed.entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn properties(out: &mut String, props: &Properties, level: usize) {
    for (i, (name, value)) in props.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        indent(out, level);
        out.push_str(name);
        out.push(':');
        property(out, value, level);
    }
}

fn property(out: &mut String, value: &PropertyValue, level: usize) {
    match value {
        PropertyValue::Scalar(v) => {
            let _ = write!(out, " {v}");
        }
        PropertyValue::Null => out.push_str(" null"),
        PropertyValue::Deferred(uri) => {
            let _ = write!(out, " <deferred {uri}>");
        }
        PropertyValue::Complex(props) => nested(out, props, level + 1),
        PropertyValue::Inline(Inline::Entry(entry)) => nested(out, entry.properties(), level + 1),
        PropertyValue::Inline(Inline::Feed(feed)) => inline_feed(out, feed, level),
    }
}

fn nested(out: &mut String, props: &Properties, level: usize) {
    if props.is_empty() {
        out.push_str(" {}");
        return;
    }
    out.push('\n');
    properties(out, props, level);
}

fn inline_feed(out: &mut String, feed: &Feed, level: usize) {
    if feed.entries.is_empty() {
        out.push_str(" {}");
        return;
    }
    out.push_str(" {");
    for (i, entry) in feed.entries.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('\n');
        indent(out, level);
        out.push_str("[\n");
        properties(out, entry.properties(), level + 1);
        out.push('\n');
        indent(out, level);
        out.push(']');
    }
    out.push('\n');
    indent(out, level);
    out.push('}');
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryMetadata, ScalarValue};

    fn string(v: &str) -> PropertyValue {
        PropertyValue::Scalar(ScalarValue::String(v.to_string()))
    }

    fn customer(id: &str) -> Entry {
        let mut entry = Entry::new(EntryMetadata::default());
        entry.insert("CustomerID", string(id));
        entry.insert("Fax", PropertyValue::Null);
        entry
    }

    #[test]
    fn flat_entry() {
        assert_eq!(render_entry(&customer("ALFKI")), "CustomerID: ALFKI\nFax: null");
    }

    #[test]
    fn inline_entry_is_indented() {
        let mut order = Entry::default();
        order.insert("OrderID", PropertyValue::Scalar(ScalarValue::Int32(10248)));
        order.insert(
            "Customer",
            PropertyValue::Inline(Inline::Entry(Box::new(customer("VINET")))),
        );
        assert_eq!(
            render_entry(&order),
            "OrderID: 10248\nCustomer:\n  CustomerID: VINET\n  Fax: null"
        );
    }

    #[test]
    fn inline_feed_lists_entries_in_brackets() {
        let feed = Feed {
            entries: vec![customer("A"), customer("B")],
            ..Feed::default()
        };
        let mut entry = Entry::default();
        entry.insert("Orders", PropertyValue::Inline(Inline::Feed(feed)));
        assert_eq!(
            render_entry(&entry),
            "Orders: {\n[\n  CustomerID: A\n  Fax: null\n],\n[\n  CustomerID: B\n  Fax: null\n]\n}"
        );
    }

    #[test]
    fn empty_and_deferred_values() {
        let mut entry = Entry::default();
        entry.insert("Orders", PropertyValue::Inline(Inline::Feed(Feed::default())));
        entry.insert("Address", PropertyValue::Complex(Properties::new()));
        entry.insert("Customer", PropertyValue::Deferred("http://svc/Orders(1)/Customer".into()));
        assert_eq!(
            render_entry(&entry),
            "Orders: {}\nAddress: {}\nCustomer: <deferred http://svc/Orders(1)/Customer>"
        );
    }

    #[test]
    fn feed_entries_are_separated_by_blank_lines() {
        let feed = Feed {
            entries: vec![customer("A"), customer("B")],
            ..Feed::default()
        };
        assert_eq!(
            render_feed(&feed),
            "CustomerID: A\nFax: null\n\nCustomerID: B\nFax: null"
        );
    }
}
