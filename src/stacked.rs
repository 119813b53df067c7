//! Following references through many files.
//!
//! [`StackedAccessor`] keeps the chain of resolvers a lookup went through, so a
//! reference found inside another file's document resolves relative to that
//! file. [`CachedItemAccessor`] adds a cache keyed by [`GlobalRef`], so every
//! target is materialized once per pass no matter how it was spelled.

use crate::accessor::Accessor;
use crate::error::RefError;
use crate::pointer;
use crate::resolver::{FileIdentity, GlobalRef, Resolver};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct StackedAccessor {
    stack: Vec<Resolver>,
    accessor: Accessor,
}

impl StackedAccessor {
    #[must_use]
    pub fn new(resolver: Resolver) -> Self {
        StackedAccessor {
            stack: vec![resolver],
            accessor: Accessor::new(),
        }
    }

    /// The resolver new references are resolved against.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        // The root is never popped.
        &self.stack[self.stack.len() - 1]
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Resolves `reference` against the current resolver, pushes the target's
    /// resolver and returns the target with its global key.
    ///
    /// On error nothing is pushed. Callers must [`pop`](Self::pop) after a
    /// successful access; [`with_ref`](Self::with_ref) does so automatically.
    ///
    /// # Errors
    /// Any resolution, load or lookup failure, wrapped with the file in which
    /// `reference` was found.
    pub fn access(&mut self, reference: &str) -> Result<(GlobalRef, Value), RefError> {
        let (sub, global) = self.resolve(reference)?;
        let value = self.lookup(&sub, &global.pointer, reference)?;
        self.stack.push(sub);
        Ok((global, value))
    }

    /// Drops the innermost resolver. The root resolver stays.
    pub fn pop(&mut self) -> Option<Resolver> {
        if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        }
    }

    /// Scoped form of [`access`](Self::access): the stack is restored when `f`
    /// returns, whether it succeeded or not.
    ///
    /// # Errors
    /// Errors from the access itself or from `f`.
    pub fn with_ref<T>(
        &mut self,
        reference: &str,
        f: impl FnOnce(&mut Self, GlobalRef, Value) -> Result<T, RefError>,
    ) -> Result<T, RefError> {
        let (global, value) = self.access(reference)?;
        let result = f(self, global, value);
        self.pop();
        result
    }

    fn resolve(&self, reference: &str) -> Result<(Resolver, GlobalRef), RefError> {
        let current = self.resolver();
        let (sub, pointer) = current
            .resolve(reference)
            .map_err(|e| current.wrap_error(reference, e))?;
        let global = GlobalRef {
            file: sub.identity().clone(),
            pointer,
        };
        Ok((sub, global))
    }

    fn lookup(&self, sub: &Resolver, pointer: &str, reference: &str) -> Result<Value, RefError> {
        let current = self.resolver();
        let document = sub
            .document()
            .map_err(|e| current.wrap_error(reference, e))?;
        let tokens = pointer::split(pointer).map_err(|e| current.wrap_error(reference, e))?;
        self.accessor
            .access(&document, &tokens)
            .cloned()
            .map_err(|e| current.wrap_error(reference, e.into()))
    }
}

/// A reference target materialized once per pass.
#[derive(Debug)]
pub struct CachedItem {
    pub file: FileIdentity,
    /// The resolver the target was first reached through; nested references
    /// in `data` resolve against it.
    pub resolver: Resolver,
    /// Pointer of the target within `file`.
    pub pointer: String,
    pub global_ref: GlobalRef,
    pub data: Value,
    local_ref: RefCell<String>,
}

impl CachedItem {
    /// The item's name in the bundled document, as an escaped pointer without
    /// the leading `/` (`definitions/Pet`).
    #[must_use]
    pub fn local_ref(&self) -> String {
        self.local_ref.borrow().clone()
    }

    pub fn set_local_ref(&self, local_ref: impl Into<String>) {
        *self.local_ref.borrow_mut() = local_ref.into();
    }

    /// The file stem of the owning document, `root` for in-memory documents.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.file
            .path()
            .and_then(|p| p.file_stem())
            .map_or_else(|| "root".to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// A [`StackedAccessor`] that hands out one shared [`CachedItem`] per global key.
pub struct CachedItemAccessor {
    stacked: StackedAccessor,
    cache: HashMap<GlobalRef, Rc<CachedItem>>,
}

impl CachedItemAccessor {
    #[must_use]
    pub fn new(resolver: Resolver) -> Self {
        CachedItemAccessor {
            stacked: StackedAccessor::new(resolver),
            cache: HashMap::new(),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        self.stacked.resolver()
    }

    /// Resolves `reference`, pushes the target's resolver and returns the
    /// cached item for its global key, creating it on first access.
    ///
    /// # Errors
    /// Same as [`StackedAccessor::access`].
    pub fn access(&mut self, reference: &str) -> Result<Rc<CachedItem>, RefError> {
        let (sub, global) = self.stacked.resolve(reference)?;
        let item = match self.cache.get(&global) {
            Some(item) => Rc::clone(item),
            None => {
                let data = self.stacked.lookup(&sub, &global.pointer, reference)?;
                let item = Rc::new(CachedItem {
                    file: global.file.clone(),
                    resolver: sub.clone(),
                    pointer: global.pointer.clone(),
                    local_ref: RefCell::new(
                        global.pointer.trim_start_matches('/').to_string(),
                    ),
                    global_ref: global.clone(),
                    data,
                });
                self.cache.insert(global, Rc::clone(&item));
                item
            }
        };
        self.stacked.stack.push(sub);
        Ok(item)
    }

    pub fn pop(&mut self) -> Option<Resolver> {
        self.stacked.pop()
    }

    /// Scoped form of [`access`](Self::access).
    ///
    /// # Errors
    /// Errors from the access itself or from `f`.
    pub fn with_ref<T>(
        &mut self,
        reference: &str,
        f: impl FnOnce(&mut Self, Rc<CachedItem>) -> Result<T, RefError>,
    ) -> Result<T, RefError> {
        let item = self.access(reference)?;
        let result = f(self, item);
        self.pop();
        result
    }

    /// The item already created for `global`, if any.
    #[must_use]
    pub fn get(&self, global: &GlobalRef) -> Option<Rc<CachedItem>> {
        self.cache.get(global).cloned()
    }
}
