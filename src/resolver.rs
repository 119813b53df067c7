use crate::error::RefError;
use crate::format;
use crate::pointer::Reference;
use crate::utils::{absolute_path, normalize_path};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where a document lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileIdentity {
    /// An in-memory document with no file backing.
    Root,
    /// An absolute, normalized path.
    File(PathBuf),
}

impl FileIdentity {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileIdentity::Root => None,
            FileIdentity::File(path) => Some(path),
        }
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileIdentity::Root => write!(f, "<root>"),
            FileIdentity::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A reference target independent of how the reference was spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalRef {
    pub file: FileIdentity,
    /// Pointer within `file`, `""` for the whole document.
    pub pointer: String,
}

impl fmt::Display for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.pointer)
    }
}

// One loaded (or not yet loaded) document, shared by every resolver that
// reaches the same file within a session.
#[derive(Debug)]
struct DocumentSlot {
    document: RefCell<Option<Rc<Value>>>,
}

impl DocumentSlot {
    fn empty() -> Rc<Self> {
        Rc::new(DocumentSlot {
            document: RefCell::new(None),
        })
    }

    fn loaded(value: Value) -> Rc<Self> {
        Rc::new(DocumentSlot {
            document: RefCell::new(Some(Rc::new(value))),
        })
    }
}

#[derive(Debug)]
struct Node {
    id: usize,
    identity: FileIdentity,
    slot: Rc<DocumentSlot>,
    // Ancestors, outermost first. Diagnostics only.
    history: Vec<FileIdentity>,
}

/// The cache shared by every resolver derived from one root.
#[derive(Debug, Default)]
struct Session {
    next_id: Cell<usize>,
    // Document slots by file, so each file is read at most once.
    slots: RefCell<HashMap<PathBuf, Rc<DocumentSlot>>>,
    // Resolvers by (parent resolver id, file).
    children: RefCell<HashMap<(usize, PathBuf), Rc<Node>>>,
}

impl Session {
    fn node(&self, identity: FileIdentity, slot: Rc<DocumentSlot>, history: Vec<FileIdentity>) -> Rc<Node> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Rc::new(Node {
            id,
            identity,
            slot,
            history,
        })
    }
}

/// One document in a reference graph.
///
/// A resolver turns reference strings into `(resolver, pointer)` pairs and
/// owns, through its session, the cache of every file reached so far.
/// Cloning a resolver is cheap and yields the same instance.
#[derive(Clone)]
pub struct Resolver {
    session: Rc<Session>,
    node: Rc<Node>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("identity", &self.node.identity)
            .field("history", &self.node.history)
            .finish()
    }
}

impl Resolver {
    /// A resolver over an in-memory document. Only `#...` references resolve.
    #[must_use]
    pub fn from_value(document: Value) -> Self {
        let session = Rc::new(Session::default());
        let node = session.node(FileIdentity::Root, DocumentSlot::loaded(document), Vec::new());
        Resolver { session, node }
    }

    /// A resolver over a file. The file is read on the first call to
    /// [`Resolver::document`], not here.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = absolute_path(path.as_ref());
        let session = Rc::new(Session::default());
        let slot = DocumentSlot::empty();
        session.slots.borrow_mut().insert(path.clone(), Rc::clone(&slot));
        let node = session.node(FileIdentity::File(path), slot, Vec::new());
        Resolver { session, node }
    }

    /// A resolver over an already-parsed document that is located at `path`,
    /// so relative references resolve against its directory.
    pub fn with_document(path: impl AsRef<Path>, document: Value) -> Self {
        let path = absolute_path(path.as_ref());
        let session = Rc::new(Session::default());
        let slot = DocumentSlot::loaded(document);
        session.slots.borrow_mut().insert(path.clone(), Rc::clone(&slot));
        let node = session.node(FileIdentity::File(path), slot, Vec::new());
        Resolver { session, node }
    }

    #[must_use]
    pub fn identity(&self) -> &FileIdentity {
        &self.node.identity
    }

    /// Identities of the resolvers this one was reached through, outermost first.
    #[must_use]
    pub fn history(&self) -> &[FileIdentity] {
        &self.node.history
    }

    /// True when both handles are the same resolver instance.
    #[must_use]
    pub fn same(&self, other: &Resolver) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// True when both resolvers see the same loaded document object.
    #[must_use]
    pub fn shares_document_with(&self, other: &Resolver) -> bool {
        Rc::ptr_eq(&self.node.slot, &other.node.slot)
    }

    /// Returns the document, loading it on first use.
    ///
    /// # Errors
    /// [`RefError::Io`] or [`RefError::Parse`] when the backing file cannot be
    /// read or parsed.
    pub fn document(&self) -> Result<Rc<Value>, RefError> {
        if let Some(document) = self.node.slot.document.borrow().as_ref() {
            return Ok(Rc::clone(document));
        }
        let FileIdentity::File(path) = &self.node.identity else {
            // Root documents are always loaded at construction.
            return Ok(Rc::new(Value::Null));
        };
        let document = Rc::new(format::load_file(path)?);
        *self.node.slot.document.borrow_mut() = Some(Rc::clone(&document));
        Ok(document)
    }

    /// Whether the document has been read yet.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.node.slot.document.borrow().is_some()
    }

    /// Resolves `reference` to the resolver of the document it names and the
    /// pointer inside that document.
    ///
    /// # Errors
    /// [`RefError::MalformedReference`] for references that do not parse,
    /// [`RefError::ExternalFromRoot`] when an in-memory document names a file.
    pub fn resolve(&self, reference: &str) -> Result<(Resolver, String), RefError> {
        let parsed = Reference::parse(reference)?;
        if parsed.is_local() {
            return Ok((self.clone(), parsed.pointer.to_string()));
        }

        let FileIdentity::File(current) = &self.node.identity else {
            return Err(RefError::ExternalFromRoot {
                reference: reference.to_string(),
            });
        };
        let dir = current.parent().unwrap_or_else(|| Path::new("/"));
        let target = normalize_path(&dir.join(parsed.file));

        let key = (self.node.id, target.clone());
        if let Some(node) = self.session.children.borrow().get(&key) {
            return Ok((self.derived(Rc::clone(node)), parsed.pointer.to_string()));
        }

        // Known file reached through another chain: share the document, but
        // keep this chain's history.
        let slot = Rc::clone(
            self.session
                .slots
                .borrow_mut()
                .entry(target.clone())
                .or_insert_with(DocumentSlot::empty),
        );
        let mut history = self.node.history.clone();
        history.push(self.node.identity.clone());
        let node = self.session.node(FileIdentity::File(target), slot, history);
        self.session.children.borrow_mut().insert(key, Rc::clone(&node));
        log::trace!("resolved {reference} from {}", self.node.identity);

        Ok((self.derived(node), parsed.pointer.to_string()))
    }

    /// Resolves `reference` straight to its global key.
    ///
    /// # Errors
    /// Same as [`Resolver::resolve`].
    pub fn global_ref(&self, reference: &str) -> Result<GlobalRef, RefError> {
        let (resolver, pointer) = self.resolve(reference)?;
        Ok(GlobalRef {
            file: resolver.identity().clone(),
            pointer,
        })
    }

    fn derived(&self, node: Rc<Node>) -> Resolver {
        Resolver {
            session: Rc::clone(&self.session),
            node,
        }
    }

    /// Wraps `error` with this resolver's file and ancestry.
    pub(crate) fn wrap_error(&self, reference: &str, error: RefError) -> RefError {
        RefError::InFile {
            reference: reference.to_string(),
            file: self.node.identity.to_string(),
            history: self.node.history.iter().map(ToString::to_string).collect(),
            source: Box::new(error),
        }
    }
}
