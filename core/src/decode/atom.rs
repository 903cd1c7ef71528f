//! Atom XML reader.
//!
//! Property values live under `content/m:properties` (or directly under
//! `entry/m:properties` for media link entries) as `d:` elements; nulls
//! are marked with `m:null="true"`. Navigation properties are `link`
//! elements whose `rel` is the related-link prefix plus the property
//! name, with an `m:inline` child when expanded.

use roxmltree::{Document, Node, NS_XML_URI};
use url::Url;

use super::scalar::{parse_text, Site};
use super::Decoder;
use crate::consts::{NS_ATOM, NS_DATA, NS_METADATA, REL_RELATED};
use crate::edm::{EdmEntityType, EdmProperty, EdmPropertyType, EdmSimpleType, Multiplicity};
use crate::error::ODataError;
use crate::types::{Entry, EntryMetadata, Feed, Inline, Properties, PropertyValue, ScalarValue};

fn document<'a>(bytes: &'a [u8], context: &str) -> Result<Document<'a>, ODataError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ODataError::payload(context, format!("document is not UTF-8: {e}")))?;
    Document::parse(text.trim_start_matches('\u{feff}'))
        .map_err(|e| ODataError::payload(context, format!("not well-formed XML: {e}")))
}

fn is_element_in(node: &Node<'_, '_>, namespace: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace() == Some(namespace)
}

fn child_in<'a, 'input>(node: Node<'a, 'input>, namespace: &str, local_name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element_in(n, namespace, local_name))
}

fn is_null(node: Node<'_, '_>) -> bool {
    node.attribute((NS_METADATA, "null")) == Some("true")
}

/// Effective `xml:base` at `node`: every base on the ancestor chain,
/// outermost first, each joined onto the one above it.
fn xml_base(node: Node<'_, '_>, context: &str) -> Result<Option<Url>, ODataError> {
    let bases: Vec<&str> = node
        .ancestors()
        .filter_map(|n| n.attribute((NS_XML_URI, "base")))
        .collect();
    let mut resolved: Option<Url> = None;
    for base in bases.into_iter().rev() {
        let url = match &resolved {
            Some(parent) => parent.join(base),
            None => Url::parse(base),
        }
        .map_err(|e| ODataError::payload(context, format!("invalid xml:base '{base}': {e}")))?;
        resolved = Some(url);
    }
    Ok(resolved)
}

/// Resolve `href` against the effective `xml:base`. Absolute hrefs are
/// returned as sent; a relative href with no base stays relative.
fn resolve_href(node: Node<'_, '_>, href: &str, context: &str) -> Result<String, ODataError> {
    if Url::parse(href).is_ok() {
        return Ok(href.to_string());
    }
    let Some(base) = xml_base(node, context)? else {
        return Ok(href.to_string());
    };
    base.join(href)
        .map(String::from)
        .map_err(|e| ODataError::payload(context, format!("cannot resolve href '{href}': {e}")))
}

fn expect_root<'a, 'input>(
    doc: &'a Document<'input>,
    local_name: &str,
    context: &str,
) -> Result<Node<'a, 'input>, ODataError> {
    let root = doc.root_element();
    if !is_element_in(&root, NS_ATOM, local_name) {
        return Err(ODataError::payload(
            context,
            format!("expected Atom <{local_name}>, found <{}>", root.tag_name().name()),
        ));
    }
    Ok(root)
}

pub(super) fn read_feed(dec: &mut Decoder<'_>, bytes: &[u8], ty: &EdmEntityType) -> Result<Feed, ODataError> {
    let context = ty.qualified_name();
    let doc = document(bytes, &context)?;
    let root = expect_root(&doc, "feed", &context)?;
    feed_node(dec, root, ty, &context)
}

pub(super) fn read_entry(dec: &mut Decoder<'_>, bytes: &[u8], ty: &EdmEntityType) -> Result<Entry, ODataError> {
    let context = ty.qualified_name();
    let doc = document(bytes, &context)?;
    let root = expect_root(&doc, "entry", &context)?;
    entry_node(dec, root, ty)
}

fn feed_node(dec: &mut Decoder<'_>, node: Node<'_, '_>, ty: &EdmEntityType, context: &str) -> Result<Feed, ODataError> {
    let mut feed = Feed::default();
    for child in node.children().filter(Node::is_element) {
        if is_element_in(&child, NS_ATOM, "entry") {
            feed.entries.push(entry_node(dec, child, ty)?);
        } else if is_element_in(&child, NS_ATOM, "link") {
            let href = child.attribute("href");
            match (child.attribute("rel"), href) {
                (Some("next"), Some(href)) => feed.next_link = Some(resolve_href(child, href, context)?),
                (Some("delta"), Some(href)) => feed.delta_link = Some(resolve_href(child, href, context)?),
                _ => {}
            }
        } else if is_element_in(&child, NS_METADATA, "count") {
            let raw = child.text().unwrap_or_default().trim();
            let count = raw
                .parse()
                .map_err(|_| ODataError::payload(context, format!("invalid m:count '{raw}'")))?;
            feed.count = Some(count);
        }
    }
    Ok(feed)
}

fn entry_metadata(node: Node<'_, '_>, context: &str) -> Result<EntryMetadata, ODataError> {
    let mut metadata = EntryMetadata {
        etag: node.attribute((NS_METADATA, "etag")).map(str::to_string),
        ..EntryMetadata::default()
    };
    for child in node.children().filter(Node::is_element) {
        if is_element_in(&child, NS_ATOM, "id") {
            metadata.id = child.text().map(|t| t.trim().to_string());
        } else if is_element_in(&child, NS_ATOM, "link") && child.attribute("rel") == Some("edit") {
            metadata.uri = child
                .attribute("href")
                .map(|href| resolve_href(child, href, context))
                .transpose()?;
        } else if is_element_in(&child, NS_ATOM, "category") {
            metadata.type_name = child.attribute("term").map(str::to_string);
        }
    }
    Ok(metadata)
}

fn entry_node(dec: &mut Decoder<'_>, node: Node<'_, '_>, ty: &EdmEntityType) -> Result<Entry, ODataError> {
    let owner = ty.qualified_name();
    let mut entry = Entry::new(entry_metadata(node, &owner)?);

    let properties = child_in(node, NS_ATOM, "content")
        .and_then(|content| child_in(content, NS_METADATA, "properties"))
        .or_else(|| child_in(node, NS_METADATA, "properties"));
    let values: Vec<Node<'_, '_>> = properties
        .map(|p| p.children().filter(|n| n.is_element() && n.tag_name().namespace() == Some(NS_DATA)).collect())
        .unwrap_or_default();

    for prop in &ty.properties {
        let site = Site {
            owner: &owner,
            property: &prop.name,
        };
        let value = match values.iter().find(|n| n.tag_name().name() == prop.name) {
            None => dec.absent(&owner, prop)?,
            Some(n) if is_null(*n) => dec.absent(&owner, prop)?,
            Some(n) => element_value(dec, prop, *n, site)?,
        };
        entry.insert(prop.name.clone(), value);
    }

    for nav in &ty.navigation_properties {
        let rel = format!("{REL_RELATED}{}", nav.name);
        let Some(link) = node
            .children()
            .find(|n| is_element_in(n, NS_ATOM, "link") && n.attribute("rel") == Some(rel.as_str()))
        else {
            continue;
        };
        let context = format!("{owner}.{}", nav.name);
        let value = match child_in(link, NS_METADATA, "inline") {
            None => {
                let href = link
                    .attribute("href")
                    .ok_or_else(|| ODataError::payload(&context, "deferred link has no href"))?;
                PropertyValue::Deferred(resolve_href(link, href, &context)?)
            }
            Some(inline) => match inline.children().find(Node::is_element) {
                None if nav.multiplicity == Multiplicity::Many => {
                    PropertyValue::Inline(Inline::Feed(Feed::default()))
                }
                None => PropertyValue::Null,
                Some(content) => {
                    let target = dec.target_type(ty, nav)?;
                    let many = nav.multiplicity == Multiplicity::Many;
                    let inline = dec.expand(target, |dec| {
                        if many && is_element_in(&content, NS_ATOM, "feed") {
                            feed_node(dec, content, target, &context).map(Inline::Feed)
                        } else if !many && is_element_in(&content, NS_ATOM, "entry") {
                            entry_node(dec, content, target).map(|e| Inline::Entry(Box::new(e)))
                        } else {
                            Err(ODataError::payload(
                                &context,
                                format!("unexpected inline <{}>", content.tag_name().name()),
                            ))
                        }
                    })?;
                    PropertyValue::Inline(inline)
                }
            },
        };
        entry.insert(nav.name.clone(), value);
    }

    for value in &values {
        let name = value.tag_name().name();
        if ty.property(name).is_none() {
            entry.insert_undeclared(name, untyped(*value));
        }
    }
    Ok(entry)
}

fn element_value(
    dec: &Decoder<'_>,
    prop: &EdmProperty,
    node: Node<'_, '_>,
    site: Site<'_>,
) -> Result<PropertyValue, ODataError> {
    match &prop.ty {
        EdmPropertyType::Simple(ty) => {
            parse_text(*ty, node.text().unwrap_or_default(), site).map(PropertyValue::Scalar)
        }
        EdmPropertyType::Complex(name) => {
            let complex = dec.complex_type(site, name)?;
            let owner = complex.qualified_name();
            let members: Vec<_> = node.children().filter(Node::is_element).collect();
            let mut props = Properties::new();
            for member in &complex.properties {
                let member_site = Site {
                    owner: &owner,
                    property: &member.name,
                };
                let value = match members.iter().find(|n| n.tag_name().name() == member.name) {
                    None => dec.absent(&owner, member)?,
                    Some(n) if is_null(*n) => dec.absent(&owner, member)?,
                    Some(n) => element_value(dec, member, *n, member_site)?,
                };
                props.push(member.name.clone(), value);
            }
            for extra in &members {
                let name = extra.tag_name().name();
                if !props.contains(name) {
                    props.push(name, untyped(*extra));
                }
            }
            Ok(PropertyValue::Complex(props))
        }
    }
}

/// Best-effort value for an element the model does not declare: typed by
/// its `m:type` when that parses, text otherwise.
fn untyped(node: Node<'_, '_>) -> PropertyValue {
    if is_null(node) {
        return PropertyValue::Null;
    }
    let children: Vec<_> = node.children().filter(Node::is_element).collect();
    if !children.is_empty() {
        let mut props = Properties::new();
        for child in children {
            props.push(child.tag_name().name(), untyped(child));
        }
        return PropertyValue::Complex(props);
    }
    let text = node.text().unwrap_or_default();
    let name = node.tag_name().name();
    let site = Site {
        owner: "",
        property: name,
    };
    let typed = node
        .attribute((NS_METADATA, "type"))
        .and_then(EdmSimpleType::from_name)
        .and_then(|ty| parse_text(ty, text, site).ok());
    PropertyValue::Scalar(typed.unwrap_or_else(|| ScalarValue::String(text.to_string())))
}
