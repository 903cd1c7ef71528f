//! Resource URIs: entity set, key predicate and system query options.
//!
//! Key predicates and option values are caller-formatted tokens. The
//! builder never re-escapes them because the right literal form depends on
//! the EDM type of the key (`'ALFKI'` for strings, `10248` for integers,
//! `datetime'…'` for dates). The only rewrite is spaces to `%20`, which no
//! literal form can carry unescaped.

use crate::consts::{METADATA, SEPARATOR};

/// `{base}/{entity_set}[({key})][/?$expand=a,b]`.
pub fn build_resource_uri(base: &str, entity_set: &str, key: Option<&str>, expand: &[&str]) -> String {
    let mut uri = ResourceUri::new(base, entity_set);
    if let Some(key) = key {
        uri = uri.key(key);
    }
    for nav in expand {
        uri = uri.expand(*nav);
    }
    uri.build()
}

/// `{base}/$metadata`.
pub fn metadata_uri(base: &str) -> String {
    format!("{}{SEPARATOR}{METADATA}", trim_base(base))
}

fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Builder for an entity-set or entity URI with query options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceUri {
    base: String,
    entity_set: String,
    key: Option<String>,
    expand: Vec<String>,
    select: Vec<String>,
    filter: Option<String>,
    orderby: Vec<String>,
    top: Option<u64>,
    skip: Option<u64>,
    skiptoken: Option<String>,
    inline_count: bool,
}

impl ResourceUri {
    pub fn new(base: &str, entity_set: &str) -> Self {
        Self {
            base: trim_base(base).to_string(),
            entity_set: entity_set.to_string(),
            ..Self::default()
        }
    }

    /// Pre-formatted key predicate, written between parentheses as is.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Navigation property (or `A/B` path) to expand inline.
    #[must_use]
    pub fn expand(mut self, nav: impl Into<String>) -> Self {
        self.expand.push(nav.into());
        self
    }

    #[must_use]
    pub fn select(mut self, property: impl Into<String>) -> Self {
        self.select.push(property.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }

    /// `property` or `property desc`.
    #[must_use]
    pub fn orderby(mut self, clause: impl Into<String>) -> Self {
        self.orderby.push(clause.into());
        self
    }

    #[must_use]
    pub fn top(mut self, n: u64) -> Self {
        self.top = Some(n);
        self
    }

    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    #[must_use]
    pub fn skiptoken(mut self, token: impl Into<String>) -> Self {
        self.skiptoken = Some(token.into());
        self
    }

    /// Ask the service for `$inlinecount=allpages`.
    #[must_use]
    pub fn inline_count(mut self) -> Self {
        self.inline_count = true;
        self
    }

    pub fn build(&self) -> String {
        let mut uri = format!("{}{SEPARATOR}{}", self.base, self.entity_set);
        if let Some(key) = &self.key {
            uri.push('(');
            uri.push_str(key);
            uri.push(')');
        }

        let mut options: Vec<(&str, String)> = Vec::new();
        if !self.expand.is_empty() {
            options.push(("$expand", self.expand.join(",")));
        }
        if let Some(filter) = &self.filter {
            options.push(("$filter", filter.clone()));
        }
        if !self.select.is_empty() {
            options.push(("$select", self.select.join(",")));
        }
        if !self.orderby.is_empty() {
            options.push(("$orderby", self.orderby.join(",")));
        }
        if let Some(top) = self.top {
            options.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            options.push(("$skip", skip.to_string()));
        }
        if let Some(token) = &self.skiptoken {
            options.push(("$skiptoken", token.clone()));
        }
        if self.inline_count {
            options.push(("$inlinecount", "allpages".to_string()));
        }

        if !options.is_empty() {
            uri.push_str("/?");
            let query: Vec<String> = options
                .into_iter()
                .map(|(name, value)| format!("{name}={}", value.replace(' ', "%20")))
                .collect();
            uri.push_str(&query.join("&"));
        }
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_set_only() {
        assert_eq!(build_resource_uri("http://svc", "Customers", None, &[]), "http://svc/Customers");
    }

    #[test]
    fn string_key_is_written_verbatim() {
        assert_eq!(
            build_resource_uri("http://svc", "Customers", Some("'ERNSH'"), &[]),
            "http://svc/Customers('ERNSH')"
        );
    }

    #[test]
    fn key_with_expand() {
        assert_eq!(
            build_resource_uri("http://svc", "Orders", Some("10248"), &["Customer"]),
            "http://svc/Orders(10248)/?$expand=Customer"
        );
    }

    #[test]
    fn multiple_expand_targets_are_comma_joined() {
        assert_eq!(
            build_resource_uri("http://svc", "Orders", Some("10248"), &["Customer", "Employee"]),
            "http://svc/Orders(10248)/?$expand=Customer,Employee"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_not_doubled() {
        assert_eq!(
            build_resource_uri("http://svc/V2/Northwind.svc/", "Customers", None, &[]),
            "http://svc/V2/Northwind.svc/Customers"
        );
        assert_eq!(metadata_uri("http://svc/"), "http://svc/$metadata");
    }

    #[test]
    fn encoded_base_is_left_alone() {
        assert_eq!(
            build_resource_uri("http://svc/my%20service", "Customers", None, &[]),
            "http://svc/my%20service/Customers"
        );
    }

    #[test]
    fn query_options_follow_expand() {
        let uri = ResourceUri::new("http://svc", "Customers")
            .filter("Country eq 'Germany'")
            .select("CustomerID")
            .select("CompanyName")
            .orderby("CompanyName desc")
            .top(5)
            .skip(10)
            .inline_count()
            .build();
        assert_eq!(
            uri,
            "http://svc/Customers/?$filter=Country%20eq%20'Germany'&$select=CustomerID,CompanyName\
             &$orderby=CompanyName%20desc&$top=5&$skip=10&$inlinecount=allpages"
        );
    }

    #[test]
    fn skiptoken_is_appended() {
        let uri = ResourceUri::new("http://svc", "Customers").skiptoken("'ANATR'").build();
        assert_eq!(uri, "http://svc/Customers/?$skiptoken='ANATR'");
    }
}
