//! Collapsing a multi-file reference graph into one document.
//!
//! Bundling runs in two passes. The [`Scanner`] walks the root document and,
//! transitively, every document it references, giving each reachable target a
//! unique local name such as `definitions/Pet`. The [`Emitter`] then copies the
//! root, places every target at its local name and rewrites every `$ref` to
//! `#/<local name>`.

use crate::accessor::Accessor;
use crate::config::{BundleOptions, ConflictPolicy, SectionRules};
use crate::error::RefError;
use crate::pointer;
use crate::resolver::{GlobalRef, Resolver};
use crate::stacked::{CachedItem, CachedItemAccessor};
use crate::value::{collect_refs, walk_refs_mut, Value, REF_KEY};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::rc::Rc;

type ItemMap = IndexMap<String, Rc<CachedItem>>;

pub struct Bundler {
    resolver: Resolver,
    options: BundleOptions,
    items: Vec<(String, GlobalRef)>,
}

impl Bundler {
    #[must_use]
    pub fn new(resolver: Resolver) -> Self {
        Self::with_options(resolver, BundleOptions::default())
    }

    #[must_use]
    pub fn with_options(resolver: Resolver, options: BundleOptions) -> Self {
        Bundler {
            resolver,
            options,
            items: Vec::new(),
        }
    }

    /// Bundles the root resolver's own document.
    ///
    /// # Errors
    /// See [`Bundler::bundle_document`].
    pub fn bundle(&mut self) -> Result<Value, RefError> {
        let document = self.resolver.document()?;
        self.bundle_document(&document)
    }

    /// Bundles `doc`, whose references resolve against the root resolver.
    ///
    /// # Errors
    /// Resolution failures anywhere in the graph, and
    /// [`RefError::NamingConflict`] under [`ConflictPolicy::Strict`].
    pub fn bundle_document(&mut self, doc: &Value) -> Result<Value, RefError> {
        let rules = self
            .options
            .sections
            .clone()
            .unwrap_or_else(|| SectionRules::detect(doc));

        let mut scanner = Scanner {
            accessor: CachedItemAccessor::new(self.resolver.clone()),
            root: doc,
            root_resolver: &self.resolver,
            rules: &rules,
            conflict: self.options.conflict,
            items: ItemMap::new(),
            named: HashSet::new(),
        };
        scanner.scan(doc, &[])?;

        self.items = scanner
            .items
            .iter()
            .map(|(name, item)| (name.clone(), item.global_ref.clone()))
            .collect();

        Emitter {
            accessor: &scanner.accessor,
            raw: Accessor::new(),
            items: &scanner.items,
            rules: &rules,
        }
        .emit(doc, &self.resolver)
    }

    /// Local names and targets of the last bundle, in discovery order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &GlobalRef)> {
        self.items.iter().map(|(name, global)| (name.as_str(), global))
    }
}

struct Scanner<'a> {
    accessor: CachedItemAccessor,
    root: &'a Value,
    root_resolver: &'a Resolver,
    rules: &'a SectionRules,
    conflict: ConflictPolicy,
    items: ItemMap,
    named: HashSet<GlobalRef>,
}

impl Scanner<'_> {
    // `base` is the local path of `doc` inside the bundle.
    fn scan(&mut self, doc: &Value, base: &[String]) -> Result<(), RefError> {
        for (path, reference) in collect_refs(doc) {
            let mut site = base.to_vec();
            site.extend(path);

            let item = self.accessor.access(&reference)?;
            let result = self.visit(item, &site);
            self.accessor.pop();
            result?;
        }
        Ok(())
    }

    fn visit(&mut self, item: Rc<CachedItem>, site: &[String]) -> Result<(), RefError> {
        if self.named.contains(&item.global_ref) {
            return Ok(());
        }
        let name = self.claim(self.local_name(&item, site)?, &item)?;
        log::debug!("{} -> #/{name}", item.global_ref);

        item.set_local_ref(name.clone());
        self.named.insert(item.global_ref.clone());
        self.items.insert(name.clone(), Rc::clone(&item));

        self.scan(&item.data, &pointer::split(&name)?)
    }

    fn local_name(&self, item: &CachedItem, site: &[String]) -> Result<String, RefError> {
        let tokens = pointer::split(&item.pointer)?;
        let section = self
            .rules
            .section_of_pointer(&tokens)
            .or_else(|| self.rules.section_for_site(site))
            .unwrap_or(&self.rules.default_section);
        let name = tokens.last().cloned().unwrap_or_else(|| item.file_stem());
        Ok(format!("{section}/{}", pointer::encode_token(&name)))
    }

    // Returns a free name for `item`, starting from `name`.
    fn claim(&self, name: String, item: &CachedItem) -> Result<String, RefError> {
        let Some(existing) = self.occupant(&name, item) else {
            return Ok(name);
        };
        match self.conflict {
            ConflictPolicy::Strict => Err(RefError::NamingConflict {
                name,
                existing: existing.to_string(),
                incoming: item.global_ref.to_string(),
            }),
            ConflictPolicy::Lenient => {
                let mut i = 1;
                loop {
                    let candidate = format!("{name}{i}");
                    if self.occupant(&candidate, item).is_none() {
                        log::warn!(
                            "naming conflict on #/{name}: {} collides with {existing}, renamed to #/{candidate}",
                            item.global_ref
                        );
                        return Ok(candidate);
                    }
                    i += 1;
                }
            }
        }
    }

    // The target already holding `name`, unless it is `item` itself.
    fn occupant(&self, name: &str, item: &CachedItem) -> Option<GlobalRef> {
        if let Some(other) = self.items.get(name) {
            return (other.global_ref != item.global_ref).then(|| other.global_ref.clone());
        }

        // Content the root document already has at this place.
        let tokens = pointer::split(name).ok()?;
        let node = Accessor::new().access(self.root, &tokens).ok()?;
        let here = GlobalRef {
            file: self.root_resolver.identity().clone(),
            pointer: pointer::join(&tokens),
        };
        if here == item.global_ref {
            return None;
        }
        // A `$ref` at the spot that points at the item is where it gets hoisted.
        let points_at_item = node
            .ref_str()
            .filter(|_| node.is_pure_ref())
            .and_then(|r| self.root_resolver.global_ref(r).ok())
            .is_some_and(|global| global == item.global_ref);
        (!points_at_item).then_some(here)
    }
}

struct Emitter<'a> {
    accessor: &'a CachedItemAccessor,
    raw: Accessor,
    items: &'a ItemMap,
    rules: &'a SectionRules,
}

impl Emitter<'_> {
    fn emit(&self, root: &Value, resolver: &Resolver) -> Result<Value, RefError> {
        let mut merged = root.clone();
        self.rewrite_refs(&mut merged, resolver)?;

        for (name, item) in self.items {
            let mut data = item.data.clone();
            self.rewrite_refs(&mut data, &item.resolver)?;
            self.raw.assign(&mut merged, &pointer::split(name)?, data)?;
        }

        for section in &self.rules.inline_sections {
            self.inline_section(&mut merged, root, section)?;
        }
        Ok(merged)
    }

    // Points every `$ref` in `value` at the local name of its target.
    fn rewrite_refs(&self, value: &mut Value, resolver: &Resolver) -> Result<(), RefError> {
        walk_refs_mut(value, &mut Vec::new(), &mut |_, node| {
            let Some(reference) = node.ref_str().map(str::to_string) else {
                return Ok(());
            };
            let global = resolver
                .global_ref(&reference)
                .map_err(|e| resolver.wrap_error(&reference, e))?;
            match self.accessor.get(&global) {
                Some(item) => {
                    let local = format!("#/{}", item.local_ref());
                    if local != reference {
                        log::trace!("rewrite {reference} -> {local}");
                        if let Some(map) = node.as_mapping_mut() {
                            map.insert(REF_KEY.to_string(), Value::String(local));
                        }
                    }
                }
                None => log::trace!("no item for {reference}, left as is"),
            }
            Ok(())
        })
    }

    // Entries of `section` that are nothing but a local `$ref` are replaced
    // by a copy of their target. Hoisted targets nothing refers to anymore
    // are dropped.
    fn inline_section(&self, merged: &mut Value, root: &Value, section: &str) -> Result<(), RefError> {
        let section_tokens = pointer::split(section)?;
        let Some(entries) = self
            .raw
            .access(merged, &section_tokens)
            .ok()
            .and_then(Value::as_mapping)
            .cloned()
        else {
            return Ok(());
        };

        let mut hoisted = Vec::new();
        for (key, entry) in entries {
            let Some(target) = entry
                .ref_str()
                .filter(|_| entry.is_pure_ref())
                .and_then(|r| r.strip_prefix('#'))
                .and_then(|p| pointer::split(p).ok())
            else {
                continue;
            };
            let mut path = section_tokens.clone();
            path.push(key);
            if target == path {
                continue;
            }
            let Some(content) = self.raw.access(merged, &target).ok().cloned() else {
                continue;
            };
            if self.raw.assign(merged, &path, content).is_ok() {
                hoisted.push(target);
            }
        }

        let remaining: HashSet<String> = collect_refs(merged)
            .into_iter()
            .map(|(_, reference)| reference)
            .collect();
        for target in hoisted {
            let local = pointer::join(&target);
            let is_item = self.items.contains_key(local.trim_start_matches('/'));
            let in_root = self
                .raw
                .access(root, &target)
                .is_ok_and(|node| !node.is_pure_ref());
            if is_item && !in_root && !remaining.contains(&format!("#{local}")) {
                self.raw.maybe_remove(merged, &target);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bundle_value(v: serde_json::Value) -> Result<Value, RefError> {
        let doc = Value::from(v);
        Bundler::new(Resolver::from_value(doc)).bundle()
    }

    #[test]
    fn test_local_only_document_is_unchanged() {
        let doc = json!({
            "swagger": "2.0",
            "definitions": {
                "Pet": {"type": "object", "properties": {"tag": {"$ref": "#/definitions/Tag"}}},
                "Tag": {"type": "string"}
            },
            "paths": {
                "/pets": {"get": {"responses": {"200": {"schema": {"$ref": "#/definitions/Pet"}}}}}
            }
        });
        assert_eq!(bundle_value(doc.clone()).unwrap(), Value::from(doc));
    }

    #[test]
    fn test_cyclic_local_document_is_unchanged() {
        let doc = json!({
            "definitions": {
                "a": {"$ref": "#/definitions/b"},
                "b": {"$ref": "#/definitions/a"}
            }
        });
        assert_eq!(bundle_value(doc.clone()).unwrap(), Value::from(doc));
    }

    #[test]
    fn test_items_lists_discovered_names() {
        let doc = Value::from(json!({
            "definitions": {"A": {"$ref": "#/definitions/B"}, "B": {"type": "string"}}
        }));
        let mut bundler = Bundler::new(Resolver::from_value(doc));
        bundler.bundle().unwrap();
        let names: Vec<_> = bundler.items().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["definitions/B"]);
    }

    #[test]
    fn test_paths_are_inlined() {
        let doc = json!({
            "paths": {"/pets": {"$ref": "#/x-paths/pets"}},
            "x-paths": {"pets": {"get": {"description": "list"}}}
        });
        let out = bundle_value(doc).unwrap();
        assert_eq!(
            out.get("paths").unwrap(),
            &Value::from(json!({"/pets": {"get": {"description": "list"}}}))
        );
        // the root's own section stays, it was authored there
        assert!(out.get("x-paths").is_some());
    }
}
