//! Canonical text form of the object model, readable by [`parse_file`][super::parse_file]
//!
//! Only objects passing [`DalObject::check_text_form`] are read back unchanged.

use std::fmt::{Display, Formatter, Result};

use anyhow::bail;

use super::{is_id_char, is_name_char};
use crate::{ClassDecl, DalObject, Field, Identity, OksFile, Value};

impl DalObject {
    /// Checks that the text form of this object parses back to the same object
    ///
    /// Names must be alphanumeric (or `_`), ids must not contain whitespace or any of
    /// `@,[]#"=`, and floats must be finite.
    pub fn check_text_form(&self) -> anyhow::Result<()> {
        check_identity(self.identity())?;
        for (name, field) in self.fields() {
            if name.is_empty() || !name.chars().all(is_name_char) {
                bail!("Invalid field name {name:?}");
            }
            match field {
                Field::Scalar(value) => check_value(name, value)?,
                Field::Scalars(values) => {
                    for value in values {
                        check_value(name, value)?;
                    }
                }
                Field::Reference(target) => check_identity(target)?,
                Field::References(targets) => {
                    for target in targets {
                        check_identity(target)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_value(name: &str, value: &Value) -> anyhow::Result<()> {
    match value {
        Value::Float(x) if !x.is_finite() => bail!("Field {name} holds the non-finite float {x}"),
        _ => Ok(()),
    }
}

fn check_identity(identity: &Identity) -> anyhow::Result<()> {
    if identity.class.is_empty() || !identity.class.chars().all(is_name_char) {
        bail!("Invalid class name {:?}", identity.class);
    }
    if identity.id.is_empty() || !identity.id.chars().all(is_id_char) {
        bail!("Invalid object id {:?}", identity.id);
    }
    Ok(())
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Value::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\r' => write!(f, "\\r")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Integer(i) => write!(f, "{i}"),
            // Debug always keeps a decimal point or exponent, so floats read back as floats
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> Result {
    write!(f, "[")?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Field::Scalar(value) => write!(f, "= {value}"),
            Field::Scalars(values) => {
                write!(f, "= ")?;
                write_list(f, values)
            }
            Field::Reference(target) => write!(f, "-> {target}"),
            Field::References(targets) => {
                write!(f, "-> ")?;
                write_list(f, targets)
            }
        }
    }
}

impl Display for DalObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "{} {}", self.class(), self.id())?;
        for (name, field) in self.fields() {
            writeln!(f, "    {name} {field}")?;
        }
        Ok(())
    }
}

impl Display for ClassDecl {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, ":class {}", self.name)?;
        if !self.superclasses.is_empty() {
            write!(f, " : {}", self.superclasses.join(", "))?;
        }
        Ok(())
    }
}

impl Display for OksFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for include in &self.includes {
            let path = include.as_str();
            let quoted = path.is_empty()
                || path.contains(|c: char| c.is_whitespace() || matches!(c, '#' | '"'));
            if quoted {
                writeln!(f, ":include {}", Value::from(path))?;
            } else {
                writeln!(f, ":include {path}")?;
            }
        }
        if !self.includes.is_empty() && !self.classes.is_empty() {
            writeln!(f)?;
        }
        for class in &self.classes {
            writeln!(f, "{class}")?;
        }
        let mut separate = !self.includes.is_empty() || !self.classes.is_empty();
        for object in self.objects.values() {
            if separate {
                writeln!(f)?;
            }
            write!(f, "{object}")?;
            separate = true;
        }
        Ok(())
    }
}
