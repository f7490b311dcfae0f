//! Sessions onto OKS configuration databases.
//!
//! A database is a root file together with everything it transitively includes. The
//! [`Database`] trait is the interface consumed by the consolidation tools; [`OksDatabase`]
//! implements it over any [`Storage`][oksconf_storage::Storage].
//!
//! ```
//! use oksconf_dal::{ClassDecl, DalObject, Identity};
//! use oksconf_database::{Database, FileRef, OksDatabase};
//! use oksconf_storage::{MemoryStorage, Storage};
//!
//! let storage = MemoryStorage::new();
//! storage.write_file("/db/core.schema.oks", ":class Widget\n".into())?;
//!
//! let mut db = OksDatabase::create(&storage, "/db/widgets.data.oks", ["core.schema.oks"], &[])?;
//! db.add_object(DalObject::new("Widget", "w1"))?;
//! db.commit()?;
//!
//! let db = OksDatabase::open(&storage, "/db/widgets.data.oks", &[])?;
//! assert_eq!(db.includes(&FileRef::Root)?, vec!["/db/core.schema.oks"]);
//! assert!(db.contains(&Identity::new("Widget", "w1"))?);
//! # Ok::<(), anyhow::Error>(())
//! ```
use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use oksconf_dal::{ClassDecl, DalObject, Identity};

mod oks;
pub use oks::OksDatabase;


/// A file of a database: either its top level (root) file or a specific file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileRef {
    Root,
    Named(Utf8PathBuf),
}

impl From<&Utf8Path> for FileRef {
    fn from(path: &Utf8Path) -> Self {
        FileRef::Named(path.to_owned())
    }
}

impl From<Utf8PathBuf> for FileRef {
    fn from(path: Utf8PathBuf) -> Self {
        FileRef::Named(path)
    }
}

/// Errors raised by database operations
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("No such database file: {0}")]
    FileNotFound(Utf8PathBuf),

    #[error("Cannot find include {include} (included from {from})")]
    MissingInclude {
        include: Utf8PathBuf,
        from: Utf8PathBuf,
    },

    #[error("No object {id} of class {class}")]
    ObjectNotFound { class: String, id: String },

    #[error("Object {identity} already exists (defined in {file})")]
    DuplicateIdentity { identity: Identity, file: Utf8PathBuf },

    #[error("The class of object {identity} is not declared by any schema included by {file}")]
    UnknownClass { identity: Identity, file: Utf8PathBuf },

    #[error("Object {identity} has no valid text form: {reason}")]
    Unwritable { identity: Identity, reason: String },

    #[error("Failed to parse {path}\n{message}")]
    Parse { path: Utf8PathBuf, message: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl DbError {
    /// Returns true for errors that report something absent (a file, include or object)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::FileNotFound(_) | DbError::MissingInclude { .. } | DbError::ObjectNotFound { .. }
        )
    }
}

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Operations of a configuration database session
pub trait Database {
    /// The path of the database's top level file
    fn root(&self) -> &Utf8Path;

    /// Lists the direct includes of the given file, in order, resolved to storage paths
    fn includes(&self, file: &FileRef) -> Result<Vec<Utf8PathBuf>>;

    /// Lists the classes declared directly in the given file, in order
    fn declared_classes(&self, file: &FileRef) -> Result<Vec<ClassDecl>>;

    /// Returns every object defined in the database and all files it includes
    fn objects(&self) -> Result<BTreeMap<Identity, &DalObject>>;

    /// Returns every object whose class is, or derives from, the given class
    fn objects_of_class(&self, class: &str) -> Result<Vec<&DalObject>>;

    /// Returns the object with the given id whose class is, or derives from, the given class
    ///
    /// Fails with [`DbError::ObjectNotFound`] when there is none.
    fn get(&self, class: &str, id: &str) -> Result<&DalObject>;

    /// Returns true if an object with exactly this identity exists
    fn contains(&self, identity: &Identity) -> Result<bool>;

    /// Registers a new object into the top level file
    ///
    /// Fails with [`DbError::DuplicateIdentity`] if the identity exists anywhere in the database,
    /// [`DbError::UnknownClass`] if no schema of the database declares its class, or
    /// [`DbError::Unwritable`] if the object could not be read back from its text form.
    fn add_object(&mut self, object: DalObject) -> Result<()>;

    /// Replaces an object in whichever file defines it, or adds it to the top level file
    ///
    /// Fails as [`Database::add_object`] does for undeclared classes and unwritable objects.
    fn update_object(&mut self, object: DalObject) -> Result<()>;

    /// Declares a class in the top level file, unless some file of the database declares it
    ///
    /// Returns true if the declaration was added.
    fn add_class(&mut self, class: ClassDecl) -> Result<bool>;

    /// Appends an include to the top level file, unless it is already included
    fn add_include(&mut self, include: &Utf8Path) -> Result<()>;

    /// Writes every modified file to storage
    fn commit(&mut self) -> Result<()>;
}
