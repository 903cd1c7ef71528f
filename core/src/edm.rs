//! Entity Data Model: the schema a service publishes at `$metadata`.
//!
//! # Design
//! `EdmModel` is built once from the metadata document and is read-only
//! afterwards. Types are keyed by their namespace-qualified name and
//! navigation properties refer to their target type by that name, so the
//! model has no internal references and is trivially `Send + Sync`.
//! Association ends are resolved while parsing: by the time a model exists,
//! every navigation property knows its target type and multiplicity.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::consts::NS_METADATA;
use crate::error::ODataError;

/// Primitive types of the OData v2 type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdmSimpleType {
    Binary,
    Boolean,
    Byte,
    SByte,
    DateTime,
    DateTimeOffset,
    Time,
    Decimal,
    Double,
    Single,
    Guid,
    Int16,
    Int32,
    Int64,
    String,
}

impl EdmSimpleType {
    /// Look up a type by its `Edm.*` name.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "Edm.Binary" => Self::Binary,
            "Edm.Boolean" => Self::Boolean,
            "Edm.Byte" => Self::Byte,
            "Edm.SByte" => Self::SByte,
            "Edm.DateTime" => Self::DateTime,
            "Edm.DateTimeOffset" => Self::DateTimeOffset,
            "Edm.Time" => Self::Time,
            "Edm.Decimal" => Self::Decimal,
            "Edm.Double" => Self::Double,
            "Edm.Single" => Self::Single,
            "Edm.Guid" => Self::Guid,
            "Edm.Int16" => Self::Int16,
            "Edm.Int32" => Self::Int32,
            "Edm.Int64" => Self::Int64,
            "Edm.String" => Self::String,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "Edm.Binary",
            Self::Boolean => "Edm.Boolean",
            Self::Byte => "Edm.Byte",
            Self::SByte => "Edm.SByte",
            Self::DateTime => "Edm.DateTime",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::Time => "Edm.Time",
            Self::Decimal => "Edm.Decimal",
            Self::Double => "Edm.Double",
            Self::Single => "Edm.Single",
            Self::Guid => "Edm.Guid",
            Self::Int16 => "Edm.Int16",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::String => "Edm.String",
        }
    }
}

impl fmt::Display for EdmSimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a structural property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdmPropertyType {
    Simple(EdmSimpleType),
    /// Namespace-qualified name of a complex type.
    Complex(String),
}

impl fmt::Display for EdmPropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdmPropertyType::Simple(ty) => write!(f, "{ty}"),
            EdmPropertyType::Complex(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmProperty {
    pub name: String,
    pub ty: EdmPropertyType,
    pub nullable: bool,
    pub max_length: Option<u32>,
}

/// Cardinality of an association end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    One,
    ZeroOrOne,
    Many,
}

impl Multiplicity {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1" => Some(Self::One),
            "0..1" => Some(Self::ZeroOrOne),
            "*" => Some(Self::Many),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmNavigationProperty {
    pub name: String,
    /// Qualified name of the association this property traverses.
    pub relationship: String,
    pub from_role: String,
    pub to_role: String,
    /// Qualified name of the entity type at the `to_role` end.
    pub target_type: String,
    pub multiplicity: Multiplicity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmEntityType {
    pub namespace: String,
    pub name: String,
    /// Key property names in declaration order.
    pub key: Vec<String>,
    pub properties: Vec<EdmProperty>,
    pub navigation_properties: Vec<EdmNavigationProperty>,
}

impl EdmEntityType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn property(&self, name: &str) -> Option<&EdmProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&EdmNavigationProperty> {
        self.navigation_properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmComplexType {
    pub namespace: String,
    pub name: String,
    pub properties: Vec<EdmProperty>,
}

impl EdmComplexType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmEntitySet {
    pub name: String,
    /// Qualified name of the entity type of every member of the set.
    pub entity_type: String,
}

/// Immutable schema of one OData service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmModel {
    container_name: String,
    entity_sets: BTreeMap<String, EdmEntitySet>,
    entity_types: BTreeMap<String, EdmEntityType>,
    complex_types: BTreeMap<String, EdmComplexType>,
}

/// Parse a `$metadata` document into an `EdmModel`.
pub fn parse_metadata(bytes: &[u8]) -> Result<EdmModel, ODataError> {
    EdmModel::parse(bytes)
}

impl EdmModel {
    pub fn parse(bytes: &[u8]) -> Result<Self, ODataError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| malformed(format!("document is not UTF-8: {e}")))?;
        let doc = Document::parse(text.trim_start_matches('\u{feff}'))
            .map_err(|e| malformed(format!("not well-formed XML: {e}")))?;
        let model = MetadataReader::read(&doc)?;
        debug!(
            container = %model.container_name,
            entity_sets = model.entity_sets.len(),
            entity_types = model.entity_types.len(),
            "parsed metadata"
        );
        Ok(model)
    }

    /// Name of the default entity container.
    pub fn default_container_name(&self) -> &str {
        &self.container_name
    }

    pub fn entity_set(&self, name: &str) -> Result<&EdmEntitySet, ODataError> {
        self.entity_sets
            .get(name)
            .ok_or_else(|| ODataError::UnknownEntitySet(name.to_string()))
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EdmEntitySet> {
        self.entity_sets.values()
    }

    pub fn entity_type(&self, qualified_name: &str) -> Option<&EdmEntityType> {
        self.entity_types.get(qualified_name)
    }

    pub fn complex_type(&self, qualified_name: &str) -> Option<&EdmComplexType> {
        self.complex_types.get(qualified_name)
    }

    /// Entity type of the members of `set`.
    pub fn entity_type_of(&self, set: &EdmEntitySet) -> Result<&EdmEntityType, ODataError> {
        self.entity_type(&set.entity_type).ok_or_else(|| {
            malformed(format!(
                "entity set '{}' references undeclared type '{}'",
                set.name, set.entity_type
            ))
        })
    }
}

fn malformed(reason: impl Into<String>) -> ODataError {
    ODataError::MalformedMetadata(reason.into())
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    local_name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == local_name)
}

fn required_attr<'a>(node: Node<'a, '_>, attr: &str) -> Result<&'a str, ODataError> {
    node.attribute(attr).ok_or_else(|| {
        malformed(format!(
            "<{}> is missing the '{attr}' attribute",
            node.tag_name().name()
        ))
    })
}

struct AssociationEnd {
    role: String,
    ty: String,
    multiplicity: Multiplicity,
}

/// Two-pass reader: collect aliases and associations first, then resolve
/// types and the default container against them.
struct MetadataReader<'a, 'input> {
    schemas: Vec<Node<'a, 'input>>,
    aliases: HashMap<String, String>,
    associations: HashMap<String, Vec<AssociationEnd>>,
}

impl<'a, 'input> MetadataReader<'a, 'input> {
    fn read(doc: &'a Document<'input>) -> Result<EdmModel, ODataError> {
        let root = doc.root_element();
        if root.tag_name().name() != "Edmx" {
            return Err(malformed(format!(
                "expected <edmx:Edmx> root, found <{}>",
                root.tag_name().name()
            )));
        }
        let data_services = elements(root, "DataServices")
            .next()
            .ok_or_else(|| malformed("missing <edmx:DataServices>"))?;
        let schemas: Vec<_> = elements(data_services, "Schema").collect();
        if schemas.is_empty() {
            return Err(malformed("no <Schema> declared"));
        }

        let mut reader = MetadataReader {
            schemas,
            aliases: HashMap::new(),
            associations: HashMap::new(),
        };
        reader.collect_aliases_and_associations()?;

        let mut entity_types = BTreeMap::new();
        let mut complex_types = BTreeMap::new();
        for &schema in &reader.schemas {
            let namespace = required_attr(schema, "Namespace")?;
            for node in elements(schema, "ComplexType") {
                let ty = EdmComplexType {
                    namespace: namespace.to_string(),
                    name: required_attr(node, "Name")?.to_string(),
                    properties: reader.read_properties(node)?,
                };
                complex_types.insert(ty.qualified_name(), ty);
            }
            for node in elements(schema, "EntityType") {
                let ty = reader.read_entity_type(namespace, node)?;
                entity_types.insert(ty.qualified_name(), ty);
            }
        }

        let (container_name, entity_sets) = reader.read_default_container()?;
        let model = EdmModel {
            container_name,
            entity_sets,
            entity_types,
            complex_types,
        };
        validate(&model)?;
        Ok(model)
    }

    fn collect_aliases_and_associations(&mut self) -> Result<(), ODataError> {
        for schema in &self.schemas {
            let namespace = required_attr(*schema, "Namespace")?;
            if let Some(alias) = schema.attribute("Alias") {
                self.aliases.insert(alias.to_string(), namespace.to_string());
            }
        }
        for schema in self.schemas.clone() {
            let namespace = required_attr(schema, "Namespace")?;
            for assoc in elements(schema, "Association") {
                let name = format!("{namespace}.{}", required_attr(assoc, "Name")?);
                let mut ends = Vec::new();
                for end in elements(assoc, "End") {
                    let raw_multiplicity = required_attr(end, "Multiplicity")?;
                    let multiplicity = Multiplicity::parse(raw_multiplicity).ok_or_else(|| {
                        malformed(format!(
                            "association '{name}' has invalid multiplicity '{raw_multiplicity}'"
                        ))
                    })?;
                    ends.push(AssociationEnd {
                        role: required_attr(end, "Role")?.to_string(),
                        ty: self.resolve(required_attr(end, "Type")?),
                        multiplicity,
                    });
                }
                self.associations.insert(name, ends);
            }
        }
        Ok(())
    }

    /// Replace a schema alias prefix with the namespace it stands for.
    fn resolve(&self, qualified: &str) -> String {
        match qualified.rsplit_once('.') {
            Some((prefix, name)) => match self.aliases.get(prefix) {
                Some(namespace) => format!("{namespace}.{name}"),
                None => qualified.to_string(),
            },
            None => qualified.to_string(),
        }
    }

    fn read_properties(&self, node: Node<'_, '_>) -> Result<Vec<EdmProperty>, ODataError> {
        elements(node, "Property")
            .map(|prop| {
                let raw_type = required_attr(prop, "Type")?;
                let ty = match EdmSimpleType::from_name(raw_type) {
                    Some(simple) => EdmPropertyType::Simple(simple),
                    None if raw_type.starts_with("Edm.") => {
                        return Err(malformed(format!("unsupported primitive type '{raw_type}'")));
                    }
                    None => EdmPropertyType::Complex(self.resolve(raw_type)),
                };
                let max_length = prop.attribute("MaxLength").and_then(|v| v.parse().ok());
                Ok(EdmProperty {
                    name: required_attr(prop, "Name")?.to_string(),
                    ty,
                    nullable: prop.attribute("Nullable") != Some("false"),
                    max_length,
                })
            })
            .collect()
    }

    fn read_entity_type(
        &self,
        namespace: &str,
        node: Node<'_, '_>,
    ) -> Result<EdmEntityType, ODataError> {
        let name = required_attr(node, "Name")?;
        let key = match elements(node, "Key").next() {
            Some(key) => elements(key, "PropertyRef")
                .map(|r| required_attr(r, "Name").map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let mut navigation_properties = Vec::new();
        for nav in elements(node, "NavigationProperty") {
            let relationship = self.resolve(required_attr(nav, "Relationship")?);
            let to_role = required_attr(nav, "ToRole")?;
            let ends = self.associations.get(&relationship).ok_or_else(|| {
                malformed(format!(
                    "{namespace}.{name} navigates undeclared association '{relationship}'"
                ))
            })?;
            let end = ends.iter().find(|e| e.role == to_role).ok_or_else(|| {
                malformed(format!(
                    "association '{relationship}' has no role '{to_role}'"
                ))
            })?;
            navigation_properties.push(EdmNavigationProperty {
                name: required_attr(nav, "Name")?.to_string(),
                relationship: relationship.clone(),
                from_role: required_attr(nav, "FromRole")?.to_string(),
                to_role: to_role.to_string(),
                target_type: end.ty.clone(),
                multiplicity: end.multiplicity,
            });
        }

        Ok(EdmEntityType {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key,
            properties: self.read_properties(node)?,
            navigation_properties,
        })
    }

    fn read_default_container(
        &self,
    ) -> Result<(String, BTreeMap<String, EdmEntitySet>), ODataError> {
        let containers: Vec<_> = self
            .schemas
            .iter()
            .flat_map(|schema| elements(*schema, "EntityContainer"))
            .collect();
        let container = containers
            .iter()
            .find(|c| c.attribute((NS_METADATA, "IsDefaultEntityContainer")) == Some("true"))
            .or_else(|| containers.first())
            .ok_or_else(|| malformed("no <EntityContainer> declared"))?;

        let mut sets = BTreeMap::new();
        for node in elements(*container, "EntitySet") {
            let set = EdmEntitySet {
                name: required_attr(node, "Name")?.to_string(),
                entity_type: self.resolve(required_attr(node, "EntityType")?),
            };
            sets.insert(set.name.clone(), set);
        }
        Ok((required_attr(*container, "Name")?.to_string(), sets))
    }
}

/// Reject models that reference types nobody declared.
fn validate(model: &EdmModel) -> Result<(), ODataError> {
    for set in model.entity_sets.values() {
        model.entity_type_of(set)?;
    }
    let check_props = |owner: String, props: &[EdmProperty]| -> Result<(), ODataError> {
        for prop in props {
            if let EdmPropertyType::Complex(name) = &prop.ty {
                if model.complex_type(name).is_none() {
                    return Err(malformed(format!(
                        "{owner}.{} has undeclared type '{name}'",
                        prop.name
                    )));
                }
            }
        }
        Ok(())
    };
    for ty in model.complex_types.values() {
        check_props(ty.qualified_name(), &ty.properties)?;
    }
    for ty in model.entity_types.values() {
        check_props(ty.qualified_name(), &ty.properties)?;
        for key in &ty.key {
            if ty.property(key).is_none() {
                return Err(malformed(format!(
                    "{} declares key '{key}' that is not a property",
                    ty.qualified_name()
                )));
            }
        }
        for nav in &ty.navigation_properties {
            if model.entity_type(&nav.target_type).is_none() {
                return Err(malformed(format!(
                    "{}.{} targets undeclared type '{}'",
                    ty.qualified_name(),
                    nav.name,
                    nav.target_type
                )));
            }
        }
    }
    Ok(())
}
