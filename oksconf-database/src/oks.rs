use std::{
    cell::OnceCell,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
};

use camino::{Utf8Path, Utf8PathBuf};
use elsa::FrozenMap;
use oksconf_dal::{parse_file, ClassDecl, DalObject, Identity, OksFile};
use oksconf_storage::{normalize, Storage};

use crate::{Database, DbError, FileRef, Result};

/// A session onto a database stored as text files
///
/// Included files are read and parsed the first time they are reached, and cached for the
/// lifetime of the session. Modifications are held in memory until [`Database::commit`].
pub struct OksDatabase<'s, S: Storage> {
    storage: &'s S,
    root: Utf8PathBuf,
    search_path: Vec<Utf8PathBuf>,
    files: FrozenMap<Utf8PathBuf, Box<OksFile>>,
    dirty: BTreeSet<Utf8PathBuf>,
    /// Every file of the database, root first, in breadth first include order
    closure: OnceCell<Vec<Utf8PathBuf>>,
    /// Declared class names mapped to their direct superclasses
    classes: OnceCell<HashMap<String, Vec<String>>>,
}

impl<'s, S: Storage> OksDatabase<'s, S> {
    /// Opens an existing database given the path of its top level file
    ///
    /// Relative include names are looked up next to the including file, then in each
    /// `search_path` directory, then as given.
    pub fn open(
        storage: &'s S,
        path: impl AsRef<Utf8Path>,
        search_path: &[Utf8PathBuf],
    ) -> Result<Self> {
        let root = normalize(path);
        if !storage.is_file(&root) {
            return Err(DbError::FileNotFound(root));
        }
        tracing::debug!("Opening database {root}");
        let db = Self::new(storage, root, search_path);
        db.file(&db.root)?;
        Ok(db)
    }

    /// Starts a new database whose top level file includes the given files
    ///
    /// Every include must resolve. Nothing is written until [`Database::commit`]; an existing
    /// file at `path` is replaced at that point.
    pub fn create(
        storage: &'s S,
        path: impl AsRef<Utf8Path>,
        includes: impl IntoIterator<Item = impl Into<Utf8PathBuf>>,
        search_path: &[Utf8PathBuf],
    ) -> Result<Self> {
        let root = normalize(path);
        tracing::debug!("Creating database {root}");
        let mut db = Self::new(storage, root, search_path);
        let file = OksFile::with_includes(includes);
        db.files.insert(db.root.clone(), Box::new(file));
        db.dirty.insert(db.root.clone());
        // Validates that every include can be found
        db.closure()?;
        Ok(db)
    }

    fn new(storage: &'s S, root: Utf8PathBuf, search_path: &[Utf8PathBuf]) -> Self {
        OksDatabase {
            storage,
            root,
            search_path: search_path.to_vec(),
            files: FrozenMap::new(),
            dirty: BTreeSet::new(),
            closure: OnceCell::new(),
            classes: OnceCell::new(),
        }
    }

    /// The directories searched for relative include names
    pub fn search_path(&self) -> &[Utf8PathBuf] {
        &self.search_path
    }

    /// Returns true if there are uncommitted modifications
    pub fn is_modified(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Returns true if the class is declared by any schema of this database
    pub fn is_declared(&self, class: &str) -> Result<bool> {
        Ok(self.classes()?.contains_key(class))
    }

    /// Returns true if `class` is `base` or derives from it
    pub fn is_a(&self, class: &str, base: &str) -> Result<bool> {
        let classes = self.classes()?;
        let mut pending = vec![class];
        let mut seen = HashSet::new();
        while let Some(class) = pending.pop() {
            if class == base {
                return Ok(true);
            }
            if seen.insert(class) {
                if let Some(superclasses) = classes.get(class) {
                    pending.extend(superclasses.iter().map(String::as_str));
                }
            }
        }
        Ok(false)
    }

    /// Returns the parsed contents of a file, loading it on first access
    fn file(&self, path: &Utf8Path) -> Result<&OksFile> {
        if let Some(file) = self.files.get(path) {
            return Ok(file);
        }
        if !self.storage.is_file(path) {
            return Err(DbError::FileNotFound(path.to_owned()));
        }
        tracing::trace!("Loading {path}");
        let text = self.storage.read_file(path)?;
        let file = parse_file(&text).map_err(|e| DbError::Parse {
            path: path.to_owned(),
            message: e.with_path(path).to_string(),
        })?;
        Ok(self.files.insert(path.to_owned(), Box::new(file)))
    }

    fn resolve_include(&self, from: &Utf8Path, include: &Utf8Path) -> Result<Utf8PathBuf> {
        let mut candidates = Vec::with_capacity(self.search_path.len() + 2);
        if include.is_absolute() {
            candidates.push(include.to_owned());
        } else {
            if let Some(dir) = from.parent() {
                candidates.push(dir.join(include));
            }
            for dir in &self.search_path {
                candidates.push(dir.join(include));
            }
            candidates.push(include.to_owned());
        }
        candidates
            .into_iter()
            .map(|path| normalize(path))
            .find(|path| self.files.get(path.as_path()).is_some() || self.storage.is_file(path))
            .ok_or_else(|| DbError::MissingInclude {
                include: include.to_owned(),
                from: from.to_owned(),
            })
    }

    fn closure(&self) -> Result<&[Utf8PathBuf]> {
        if let Some(closure) = self.closure.get() {
            return Ok(closure.as_slice());
        }
        let mut order = vec![self.root.clone()];
        let mut seen: HashSet<Utf8PathBuf> = order.iter().cloned().collect();
        let mut index = 0;
        while index < order.len() {
            let path = order[index].clone();
            for include in self.includes(&FileRef::Named(path))? {
                if seen.insert(include.clone()) {
                    order.push(include);
                }
            }
            index += 1;
        }
        Ok(self.closure.get_or_init(|| order).as_slice())
    }

    fn classes(&self) -> Result<&HashMap<String, Vec<String>>> {
        if let Some(classes) = self.classes.get() {
            return Ok(classes);
        }
        let mut classes = HashMap::new();
        for path in self.closure()? {
            for class in &self.file(path)?.classes {
                classes
                    .entry(class.name.clone())
                    .or_insert_with(Vec::new)
                    .extend(class.superclasses.iter().cloned());
            }
        }
        Ok(self.classes.get_or_init(|| classes))
    }

    /// Finds the file of this database that defines the given identity
    fn owner(&self, identity: &Identity) -> Result<Option<&Utf8Path>> {
        for path in self.closure()? {
            if self.file(path)?.objects.contains_key(identity) {
                return Ok(Some(path.as_path()));
            }
        }
        Ok(None)
    }

    fn path_of(&self, file: &FileRef) -> Utf8PathBuf {
        match file {
            FileRef::Root => self.root.clone(),
            FileRef::Named(path) => normalize(path),
        }
    }

    /// Checks an object may be stored: its class is declared and it can be written as text
    fn check_storable(&self, object: &DalObject) -> Result<()> {
        object
            .check_text_form()
            .map_err(|e| DbError::Unwritable {
                identity: object.identity().clone(),
                reason: e.to_string(),
            })?;
        if self.is_declared(object.class())? {
            Ok(())
        } else {
            Err(DbError::UnknownClass {
                identity: object.identity().clone(),
                file: self.root.clone(),
            })
        }
    }

    /// Returns a loaded file for modification, marking it to be written on commit
    fn file_mut(&mut self, path: &Utf8Path) -> Result<&mut OksFile> {
        self.dirty.insert(path.to_owned());
        self.files
            .as_mut()
            .get_mut(path)
            .map(|file| &mut **file)
            .ok_or_else(|| DbError::FileNotFound(path.to_owned()))
    }
}

impl<S: Storage> Database for OksDatabase<'_, S> {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn includes(&self, file: &FileRef) -> Result<Vec<Utf8PathBuf>> {
        let path = self.path_of(file);
        let mut resolved = Vec::new();
        for include in &self.file(&path)?.includes {
            let include = self.resolve_include(&path, include)?;
            tracing::trace!("{path} includes {include}");
            resolved.push(include);
        }
        Ok(resolved)
    }

    fn declared_classes(&self, file: &FileRef) -> Result<Vec<ClassDecl>> {
        Ok(self.file(&self.path_of(file))?.classes.clone())
    }

    fn objects(&self) -> Result<BTreeMap<Identity, &DalObject>> {
        let mut objects = BTreeMap::new();
        for path in self.closure()? {
            for (identity, object) in &self.file(path)?.objects {
                if objects.insert(identity.clone(), object).is_some() {
                    return Err(DbError::DuplicateIdentity {
                        identity: identity.clone(),
                        file: path.clone(),
                    });
                }
            }
        }
        Ok(objects)
    }

    fn objects_of_class(&self, class: &str) -> Result<Vec<&DalObject>> {
        let mut matching = Vec::new();
        for object in self.objects()?.into_values() {
            if self.is_a(object.class(), class)? {
                matching.push(object);
            }
        }
        Ok(matching)
    }

    fn get(&self, class: &str, id: &str) -> Result<&DalObject> {
        let identity = Identity::new(class, id);
        for path in self.closure()? {
            if let Some(object) = self.file(path)?.objects.get(&identity) {
                return Ok(object);
            }
        }
        for object in self.objects()?.into_values() {
            if object.id() == id && self.is_a(object.class(), class)? {
                return Ok(object);
            }
        }
        Err(DbError::ObjectNotFound {
            class: class.to_owned(),
            id: id.to_owned(),
        })
    }

    fn contains(&self, identity: &Identity) -> Result<bool> {
        Ok(self.owner(identity)?.is_some())
    }

    fn add_object(&mut self, object: DalObject) -> Result<()> {
        if let Some(file) = self.owner(object.identity())? {
            return Err(DbError::DuplicateIdentity {
                identity: object.identity().clone(),
                file: file.to_owned(),
            });
        }
        self.check_storable(&object)?;
        tracing::trace!("Adding {} to {}", object.identity(), self.root);
        let root = self.root.clone();
        self.file_mut(&root)?
            .objects
            .insert(object.identity().clone(), object);
        Ok(())
    }

    fn update_object(&mut self, object: DalObject) -> Result<()> {
        self.check_storable(&object)?;
        let owner = self
            .owner(object.identity())?
            .map(Utf8Path::to_owned)
            .unwrap_or_else(|| self.root.clone());
        tracing::trace!("Updating {} in {}", object.identity(), owner);
        self.file_mut(&owner)?
            .objects
            .insert(object.identity().clone(), object);
        Ok(())
    }

    fn add_class(&mut self, class: ClassDecl) -> Result<bool> {
        if self.is_declared(&class.name)? {
            return Ok(false);
        }
        tracing::trace!("Declaring class {} in {}", class.name, self.root);
        let root = self.root.clone();
        self.file_mut(&root)?.classes.push(class);
        self.classes = OnceCell::new();
        Ok(true)
    }

    fn add_include(&mut self, include: &Utf8Path) -> Result<()> {
        if self.file(&self.root)?.includes.iter().any(|i| i == include) {
            return Ok(());
        }
        self.resolve_include(&self.root, include)?;
        let root = self.root.clone();
        self.file_mut(&root)?.includes.push(include.to_owned());
        self.closure = OnceCell::new();
        self.classes = OnceCell::new();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let dirty: Vec<Utf8PathBuf> = self.dirty.iter().cloned().collect();
        for path in dirty {
            let file = self.file(&path)?;
            tracing::debug!("Writing {} ({} objects)", path, file.objects.len());
            self.storage.write_file(&path, file.to_string())?;
            self.dirty.remove(&path);
        }
        Ok(())
    }
}
