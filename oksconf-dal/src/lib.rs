//! This crate provides the object model of OKS configuration files (see [DalObject] and
//! [OksFile]) and the means to read and write their text form (see [parse_file]).
//!
//! The text form is line based. Top level lines declare includes, classes and objects; the
//! fields of an object follow its header line, indented by four spaces:
//!
//! | Syntax                            | Description
//! |-----------------------------------|---------------------------
//! |`:include` _path_                  | Includes another schema or data file
//! |`:class` _Name_                    | Declares a class
//! |`:class` _Name_ `:` _Base_, ...    | Declares a class deriving from other classes
//! | _Class_ _id_                      | Starts an object with the given identity
//! |     _field_ `=` _value_           | Sets a scalar (string, integer, float, bool) or list of scalars
//! |     _field_ `->` _Class_`@`_id_   | Sets a single relationship
//! |     _field_ `->` `[`...`]`        | Sets a multi-valued relationship
//!
//! Anything following a `#` (outside of a string) is a comment.
//!
//! ```
//! use oksconf_dal::{parse_file, Field, Identity, Value};
//!
//! let file = parse_file("
//! :include schema/core.schema.oks
//!
//! Widget w1
//!     name = \"first\"
//!     parent -> Widget@w2
//! ")?;
//!
//! assert_eq!(file.includes, vec!["schema/core.schema.oks"]);
//! let widget = file.objects.get(&Identity::new("Widget", "w1")).unwrap();
//! assert_eq!(widget.get("name"), Some(&Field::Scalar(Value::String("first".into()))));
//! assert_eq!(widget.reference("parent"), Some(&Identity::new("Widget", "w2")));
//! # Ok::<(), anyhow::Error>(())
//! ```
use std::{collections::BTreeMap, fmt::Display};

use camino::Utf8PathBuf;

mod text;
pub use text::{parse_file, ParseError};

/// The identity of a DAL object: its class and its id, unique within a database
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    /// The class (schema type) name
    pub class: String,
    /// The object's identifier, scoped per class
    pub id: String,
}

impl Identity {
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        Identity {
            class: class.into(),
            id: id.into(),
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.class, self.id)
    }
}

/// A scalar field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// The value of one field of a [DalObject]
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A single scalar attribute
    Scalar(Value),
    /// A multi-valued attribute
    Scalars(Vec<Value>),
    /// A single-valued relationship to another object
    Reference(Identity),
    /// A multi-valued relationship to other objects
    References(Vec<Identity>),
}

/// A schema-typed configuration object
#[derive(Debug, Clone, PartialEq)]
pub struct DalObject {
    identity: Identity,
    fields: BTreeMap<String, Field>,
}

impl DalObject {
    /// Constructs an object with no fields set
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        DalObject {
            identity: Identity::new(class, id),
            fields: BTreeMap::new(),
        }
    }

    /// Sets a field, returning the object (for building objects in place)
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.set(name, field);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn class(&self) -> &str {
        &self.identity.class
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// Returns the named field, if set
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Sets the named field, returning any previous value
    pub fn set(&mut self, name: impl Into<String>, field: Field) -> Option<Field> {
        self.fields.insert(name.into(), field)
    }

    /// Unsets the named field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Iterates over the fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Returns the target of a single-valued relationship
    pub fn reference(&self, name: &str) -> Option<&Identity> {
        match self.fields.get(name) {
            Some(Field::Reference(target)) => Some(target),
            _ => None,
        }
    }

    /// Returns the targets of a multi-valued relationship (empty if unset)
    pub fn references(&self, name: &str) -> &[Identity] {
        match self.fields.get(name) {
            Some(Field::References(targets)) => targets,
            _ => &[],
        }
    }

    /// Iterates over every relationship target of this object, with the name of its field
    pub fn relationships(&self) -> impl Iterator<Item = (&str, &Identity)> {
        self.fields.iter().flat_map(|(name, field)| {
            let targets: &[Identity] = match field {
                Field::Reference(target) => std::slice::from_ref(target),
                Field::References(targets) => targets,
                Field::Scalar(_) | Field::Scalars(_) => &[],
            };
            targets.iter().map(move |target| (name.as_str(), target))
        })
    }
}

/// A class declared by a schema file, with the names of the classes it derives from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub superclasses: Vec<String>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        ClassDecl {
            name: name.into(),
            superclasses: Vec::new(),
        }
    }
}

/// The contents of one configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OksFile {
    /// Files included by this one, in the order given
    pub includes: Vec<Utf8PathBuf>,
    /// Classes declared in this file, in the order given
    pub classes: Vec<ClassDecl>,
    /// Objects defined in this file
    pub objects: BTreeMap<Identity, DalObject>,
}

impl OksFile {
    /// Constructs a file containing only the given includes
    pub fn with_includes(includes: impl IntoIterator<Item = impl Into<Utf8PathBuf>>) -> Self {
        OksFile {
            includes: includes.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationships_in_field_order() {
        let object = DalObject::new("Segment", "root")
            .with("name", Field::Scalar("top".into()))
            .with(
                "applications",
                Field::References(vec![Identity::new("App", "a1"), Identity::new("App", "a2")]),
            )
            .with("controller", Field::Reference(Identity::new("App", "ctl")));
        let relationships: Vec<_> = object
            .relationships()
            .map(|(name, target)| format!("{name}:{target}"))
            .collect();
        assert_eq!(
            relationships,
            vec!["applications:App@a1", "applications:App@a2", "controller:App@ctl"]
        );
    }

    #[test]
    fn typed_accessors() {
        let mut object = DalObject::new("Session", "s")
            .with("segment", Field::Reference(Identity::new("Segment", "root")));
        assert_eq!(object.reference("segment"), Some(&Identity::new("Segment", "root")));
        assert!(object.references("segment").is_empty());
        assert!(object.references("disabled").is_empty());
        assert!(object.remove("segment").is_some());
        assert_eq!(object.reference("segment"), None);
        assert_eq!(object.identity().to_string(), "Session@s");
    }
}
